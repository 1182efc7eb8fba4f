//! Inbound frame validation.
//!
//! Turns one text frame into a call, a client reply to ignore, or the
//! error frame to send back.

use roomcast_rpc::errors;
use roomcast_rpc::types::{JSONRPC_VERSION, RpcRequest, RpcResponse};
use serde_json::{Map, Value};

/// A validated inbound frame.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    /// Request or notification to dispatch.
    Call(RpcRequest),
    /// Bare result/error echo from the client; ignored.
    Reply(Value),
}

/// Frame rejected before dispatch.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// Not decodable as JSON.
    #[error("parse error: {0}")]
    Parse(String),
    /// JSON, but not a valid call.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl FrameError {
    /// The error frame to send back.
    pub fn to_response(&self) -> RpcResponse {
        match self {
            Self::Parse(detail) => RpcResponse::parse_error(detail.clone()),
            Self::Invalid(detail) => RpcResponse::invalid_request(detail.clone()),
        }
    }

    /// JSON-RPC code of the error frame.
    pub fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => errors::PARSE_ERROR,
            Self::Invalid(_) => errors::INVALID_REQUEST,
        }
    }
}

/// Decode and validate a text frame.
pub fn decode_text(text: &str) -> Result<Inbound, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(|e| FrameError::Parse(e.to_string()))?;
    classify(value)
}

/// Decode and validate a binary frame holding UTF-8 JSON.
pub fn decode_binary(bytes: &[u8]) -> Result<Inbound, FrameError> {
    let text = std::str::from_utf8(bytes).map_err(|e| FrameError::Parse(e.to_string()))?;
    decode_text(text)
}

/// Validate an already-parsed message.
pub fn classify(value: Value) -> Result<Inbound, FrameError> {
    let mut map = match value {
        Value::Object(map) => map,
        Value::Array(_) => return Err(invalid("batch requests are not supported")),
        _ => return Err(invalid("request must be a JSON object")),
    };

    match map.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        Some(other) => {
            return Err(invalid(format!(
                "jsonrpc version must be \"{JSONRPC_VERSION}\", got {other}"
            )));
        }
        None => return Err(invalid("jsonrpc version is mandatory")),
    }

    match map.get("method") {
        Some(Value::String(_)) => {}
        Some(_) => return Err(invalid("method must be a string")),
        None if is_reply(&map) => return Ok(Inbound::Reply(Value::Object(map))),
        None => return Err(invalid("Method is mandatory")),
    }

    match map.get("id") {
        None | Some(Value::Null | Value::String(_) | Value::Number(_)) => {}
        Some(_) => return Err(invalid("id must be a string, a number, or null")),
    }

    match map.get("params") {
        Some(Value::Array(_) | Value::Object(_)) => {}
        None | Some(Value::Null) => {
            let _ = map.insert("params".into(), Value::Array(Vec::new()));
        }
        Some(_) => return Err(invalid("params must be an array or an object")),
    }

    serde_json::from_value(Value::Object(map))
        .map(Inbound::Call)
        .map_err(|e| invalid(e.to_string()))
}

fn is_reply(map: &Map<String, Value>) -> bool {
    map.contains_key("result") || map.contains_key("error")
}

fn invalid(detail: impl Into<String>) -> FrameError {
    FrameError::Invalid(detail.into())
}
