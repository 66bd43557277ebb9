//! Cancellation registry for in-flight optimization requests
//!
//! Cooperative cancellation with owner verification and RAII cleanup via
//! `RequestGuard`. A cancelled request abandons outstanding provider calls
//! and never produces a partial result.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Global cancellation registry singleton
pub static CANCELLATION: Lazy<CancellationRegistry> = Lazy::new(CancellationRegistry::default);

struct RequestEntry {
    token: CancellationToken,
    owner_id: Uuid,
}

/// RAII guard that removes the request from the registry when dropped.
/// Must be kept alive for the duration of request processing.
pub struct RequestGuard {
    request_id: Uuid,
    token: CancellationToken,
    registry: CancellationRegistry,
}

impl RequestGuard {
    /// Token to select against while processing this request.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.request_id);
    }
}

/// Error type for cancel operations
#[derive(Debug, PartialEq, Eq)]
pub enum CancelError {
    /// Caller is not the owner of this request
    NotOwner,
}

/// Thread-safe registry of in-flight requests and their cancellation tokens.
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    requests: Arc<Mutex<HashMap<Uuid, RequestEntry>>>,
}

impl CancellationRegistry {
    /// Register a request with its owner. Returns a `RequestGuard` that must
    /// be held in scope during processing; dropping it removes the entry.
    pub fn register(&self, request_id: Uuid, owner_id: Uuid) -> RequestGuard {
        let token = CancellationToken::new();
        self.requests.lock().insert(request_id, RequestEntry {
            token: token.clone(),
            owner_id,
        });
        RequestGuard {
            request_id,
            token,
            registry: self.clone(),
        }
    }

    /// Cancel a request, ONLY if the caller is the owner.
    ///
    /// Returns:
    /// - `Ok(true)`  request found and cancelled
    /// - `Ok(false)` request not found (already finished or never started)
    /// - `Err(NotOwner)` request exists but belongs to a different user
    pub fn cancel(&self, request_id: &Uuid, caller_id: Uuid) -> Result<bool, CancelError> {
        let requests = self.requests.lock();
        match requests.get(request_id) {
            Some(entry) => {
                if entry.owner_id != caller_id {
                    return Err(CancelError::NotOwner);
                }
                entry.token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Check if a request has been cancelled.
    pub fn is_cancelled(&self, request_id: &Uuid) -> bool {
        self.requests.lock()
            .get(request_id)
            .is_some_and(|e| e.token.is_cancelled())
    }

    /// Remove a finished request from the registry.
    /// Called automatically by `RequestGuard::drop`.
    pub fn remove(&self, request_id: &Uuid) {
        self.requests.lock().remove(request_id);
    }

    #[cfg(test)]
    fn contains(&self, request_id: &Uuid) -> bool {
        self.requests.lock().contains_key(request_id)
    }
}
