//! Error response DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard error response format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_details_omitted_when_absent() {
        let body = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "Entity not found")).unwrap();
        assert_eq!(body, json!({ "code": "NOT_FOUND", "message": "Entity not found" }));
    }

    #[test]
    fn test_with_details() {
        let response = ErrorResponse::new("CONFIGURATION_ERROR", "Configuration error")
            .with_details(json!({ "key": "database.url" }));
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["details"]["key"], "database.url");
    }
}
