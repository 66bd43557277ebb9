//! NATS message envelopes

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::RequestContext;

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Explicit capability context for this request; handlers check it
    /// instead of relying on ambient session state
    #[serde(default)]
    pub context: RequestContext,
    pub payload: T,
}

impl<T> Request<T> {
    pub fn with_context(context: RequestContext, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            context,
            payload,
        }
    }
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Capability;

    #[test]
    fn request_deserializes_without_context() {
        let json = r#"{
            "id": "6f1c1a2e-7c4b-4d08-9a35-0f4c0d3b2a11",
            "timestamp": "2026-03-02T08:00:00Z",
            "payload": {"value": 1}
        }"#;
        let request: Request<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert!(request.context.actor_id.is_none());
        assert!(request.context.capabilities.is_empty());
    }

    #[test]
    fn request_roundtrips_context() {
        let context = RequestContext {
            actor_id: Some(Uuid::new_v4()),
            capabilities: vec![Capability::PlanRoutes],
        };
        let request = Request::with_context(context, serde_json::json!({"stops": []}));
        let json = serde_json::to_string(&request).unwrap();
        let parsed: Request<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.context.capabilities, vec![Capability::PlanRoutes]);
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let id = Uuid::new_v4();
        let error = ErrorResponse::new(id, "INVALID_INPUT", "no usable stop");
        assert_eq!(error.id, id);
        assert_eq!(error.error.code, "INVALID_INPUT");
        let json = serde_json::to_string(&error).unwrap();
        assert!(!json.contains("details"));
    }
}
