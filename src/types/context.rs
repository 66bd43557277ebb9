//! Request capability context
//!
//! Every request carries an explicit list of capabilities granted to the
//! caller; handlers check the one they need at the top. Nothing is inferred
//! from ambient state.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Capabilities the gateway can grant to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Run route optimizations and cancel their own in-flight requests
    PlanRoutes,
    /// Read staff schedules (staff-day stop lists)
    ViewSchedule,
}

/// Capability context attached to every request envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// The acting user; required for any capability-gated operation
    #[serde(default)]
    pub actor_id: Option<Uuid>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("request has no actor")]
    NoActor,
    #[error("missing capability: {0:?}")]
    Missing(Capability),
}

impl RequestContext {
    /// Check the capability and return the acting user's id.
    pub fn require(&self, capability: Capability) -> Result<Uuid, CapabilityError> {
        let actor_id = self.actor_id.ok_or(CapabilityError::NoActor)?;
        if self.capabilities.contains(&capability) {
            Ok(actor_id)
        } else {
            Err(CapabilityError::Missing(capability))
        }
    }
}
