//! JSON-RPC error types

use serde::{Deserialize, Serialize};

/// Error codes seen on the host endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received
    ParseError = -32700,
    /// The JSON sent is not a valid Request object
    InvalidRequest = -32600,
    /// The method does not exist / is not available
    MethodNotFound = -32601,
    /// Invalid method parameter(s)
    InvalidParams = -32602,
    /// Internal JSON-RPC error
    InternalError = -32603,
    /// Session expired or missing
    SessionExpired = 100,
    /// Any exception raised by a model method
    ServerError = 200,
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            100 => ErrorCode::SessionExpired,
            200 => ErrorCode::ServerError,
            _ => ErrorCode::InternalError,
        }
    }
}

/// Exception details attached to host errors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostErrorData {
    /// Exception class, e.g. `odoo.exceptions.AccessError`
    #[serde(default)]
    pub name: String,
    /// User-facing message
    #[serde(default)]
    pub message: String,
    /// Server traceback
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub debug: String,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional additional data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HostErrorData>,
}

impl JsonRpcError {
    /// Creates a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a new error with exception details
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: HostErrorData) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Returns the typed error code
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from(self.code)
    }

    /// The most specific message available: the exception message when
    /// present, the envelope message otherwise.
    pub fn user_message(&self) -> &str {
        match &self.data {
            Some(data) if !data.message.is_empty() => &data.message,
            _ => &self.message,
        }
    }

    /// Returns true when the exception is an access or missing-record error
    pub fn is_access_error(&self) -> bool {
        self.data
            .as_ref()
            .map(|data| data.name.ends_with("AccessError"))
            .unwrap_or(false)
    }

    /// Returns true when the record no longer exists
    pub fn is_missing_record(&self) -> bool {
        self.data
            .as_ref()
            .map(|data| data.name.ends_with("MissingError"))
            .unwrap_or(false)
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message())
    }
}

impl std::error::Error for JsonRpcError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = JsonRpcError::new(ErrorCode::ServerError, "Odoo Server Error");
        let json = serde_json::to_string(&error).unwrap();

        assert!(json.contains("200"));
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_exception_details() {
        let error: JsonRpcError = serde_json::from_value(serde_json::json!({
            "code": 200,
            "message": "Odoo Server Error",
            "data": {
                "name": "odoo.exceptions.MissingError",
                "message": "Record does not exist or has been deleted.",
                "debug": "Traceback ..."
            }
        }))
        .unwrap();

        assert_eq!(error.error_code(), ErrorCode::ServerError);
        assert!(error.is_missing_record());
        assert!(!error.is_access_error());
        assert_eq!(
            error.to_string(),
            "[200] Record does not exist or has been deleted."
        );
    }

    #[test]
    fn test_unknown_code_maps_to_internal() {
        assert_eq!(ErrorCode::from(42), ErrorCode::InternalError);
    }
}
