//! JSON-RPC error codes and the engine error type.

use serde_json::Value;

use crate::types::RpcErrorBody;

// ── Error code constants ────────────────────────────────────────────

/// Frame is not valid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Frame is JSON but not a valid call.
pub const INVALID_REQUEST: i64 = -32600;
/// No exact method or namespace matches.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Loop-level failure.
pub const INTERNAL_ERROR: i64 = -32603;
/// Application failure: handler errors and the authentication gate.
pub const APPLICATION_ERROR: i64 = -32000;

/// Error produced while resolving or running a method.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Neither an exact method nor a namespace matched.
    #[error("{method} is not a method or part of a namespace")]
    MethodNotFound {
        /// Requested method name.
        method: String,
    },

    /// Method requires an authenticated session.
    #[error("'{method}' needs authentication")]
    Unauthenticated {
        /// Requested method name.
        method: String,
    },

    /// Params did not match the handler's expected shape.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Handler-level failure.
    #[error("{message}")]
    Application {
        /// Human-readable message.
        message: String,
    },

    /// Unexpected failure inside the engine (serialization, panics).
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl RpcError {
    /// Shorthand for [`RpcError::Application`].
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    /// Numeric code sent on the wire.
    pub fn code(&self) -> i64 {
        match self {
            Self::MethodNotFound { .. } => METHOD_NOT_FOUND,
            _ => APPLICATION_ERROR,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MethodNotFound { .. } => "method_not_found",
            Self::Unauthenticated { .. } => "unauthenticated",
            Self::InvalidParams { .. } => "invalid_params",
            Self::Application { .. } => "application",
            Self::Internal { .. } => "internal",
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> RpcErrorBody {
        match self {
            Self::MethodNotFound { .. } => RpcErrorBody {
                code: METHOD_NOT_FOUND,
                message: "Method not found".into(),
                data: Some(Value::String(self.to_string())),
            },
            _ => RpcErrorBody {
                code: self.code(),
                message: self.to_string(),
                data: None,
            },
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}
