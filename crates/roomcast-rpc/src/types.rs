//! JSON-RPC 2.0 wire-format types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{self, RpcError};

/// Protocol version carried on every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Call parameters: either positional or named.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    /// `"params": [..]`
    Positional(Vec<Value>),
    /// `"params": {..}`
    Named(Map<String, Value>),
}

impl Default for Params {
    fn default() -> Self {
        Self::Positional(Vec::new())
    }
}

impl Params {
    /// Whether no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Positional(args) => args.is_empty(),
            Self::Named(args) => args.is_empty(),
        }
    }

    /// Positional argument at `index`, if params are positional.
    pub fn positional(&self, index: usize) -> Option<&Value> {
        match self {
            Self::Positional(args) => args.get(index),
            Self::Named(_) => None,
        }
    }

    /// Named argument `key`, if params are named.
    pub fn named(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Named(args) => args.get(key),
            Self::Positional(_) => None,
        }
    }

    /// The params as a plain JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Positional(args) => Value::Array(args.clone()),
            Self::Named(args) => Value::Object(args.clone()),
        }
    }

    /// Decode into a typed value.
    ///
    /// Positional params decode as a sequence (tuples, `Vec`, or a struct
    /// in field order); named params decode as a map (structs).
    pub fn decode<P: DeserializeOwned>(&self) -> Result<P, RpcError> {
        serde_json::from_value(self.to_value()).map_err(|e| RpcError::InvalidParams {
            message: format!("invalid params: {e}"),
        })
    }
}

/// Validated inbound call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Request id; `None` marks a notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name (e.g. `all.hello`).
    pub method: String,
    /// Call parameters, empty positional when absent.
    #[serde(default)]
    pub params: Params,
}

impl RpcRequest {
    /// Build a request that expects a response.
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Params) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Build a notification (no id, no response).
    pub fn notification(method: impl Into<String>, params: Params) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Whether this call is a notification.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Outbound response frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Echoed id. `Some(Value::Null)` renders `"id": null`; `None` omits the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

/// Structured error body inside an [`RpcResponse`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    /// Numeric JSON-RPC error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    /// Build a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn failure(id: Option<Value>, error: RpcErrorBody) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// `-32700` for undecodable frames; always carries `"id": null`.
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::failure(
            Some(Value::Null),
            RpcErrorBody {
                code: errors::PARSE_ERROR,
                message: "Parse error".into(),
                data: Some(Value::String(detail.into())),
            },
        )
    }

    /// `-32600` for decodable frames that are not valid calls.
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::failure(
            None,
            RpcErrorBody {
                code: errors::INVALID_REQUEST,
                message: "Invalid Request".into(),
                data: Some(Value::String(detail.into())),
            },
        )
    }

    /// `-32603` for loop-level failures.
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::failure(
            None,
            RpcErrorBody {
                code: errors::INTERNAL_ERROR,
                message: "Internal error".into(),
                data: Some(Value::String(detail.into())),
            },
        )
    }

    /// Whether this is an error frame.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Server-pushed notification. Carries no id by construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcNotification {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: Params,
}

impl RpcNotification {
    /// Create a notification.
    pub fn new(method: impl Into<String>, params: Params) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params,
        }
    }
}
