//! RPC request/response envelopes.
//!
//! The balancer never interprets `params` or `result`; it only needs the
//! envelope shape to decode a call from the client and to build error
//! replies of its own.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A client call: `{"method": "...", "params": ...}`.
///
/// `params` is kept exactly as sent: absent stays absent and any JSON
/// value is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Any other top-level keys, forwarded untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: None,
            extra: Map::new(),
        }
    }

    pub fn with_params(mut self, params: impl Into<Value>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Named params, if `params` is a JSON object.
    pub fn named_params(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref().and_then(Value::as_object)
    }
}

/// A reply envelope, `{"result": ...}` or `{"error": "..."}`.
///
/// Backend replies are kept as the raw JSON object so they can be relayed
/// without losing keys the balancer does not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RpcResponse(Map<String, Value>);

impl RpcResponse {
    /// Build a success envelope.
    pub fn result(value: Value) -> Self {
        let mut map = Map::new();
        map.insert("result".to_string(), value);
        Self(map)
    }

    /// Build an error envelope.
    pub fn error(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("error".to_string(), Value::String(message.into()));
        Self(map)
    }

    pub fn result_value(&self) -> Option<&Value> {
        self.0.get("result")
    }

    /// The error message, if this is an error envelope.
    pub fn error_message(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.0.contains_key("error")
    }

}

impl From<Map<String, Value>> for RpcResponse {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
