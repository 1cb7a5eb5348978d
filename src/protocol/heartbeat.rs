//! Heartbeat messages pushed by backends.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One liveness signal.
///
/// The first message on a connection carries `port`, later ones omit it:
/// ```text
/// {"heartbeat": true, "port": "9001"}
/// {"heartbeat": true}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Value>,
}

impl HeartbeatMessage {
    /// The opening heartbeat announcing the serving port.
    pub fn first(port: impl Into<String>) -> Self {
        Self {
            heartbeat: Some(Value::Bool(true)),
            port: Some(Value::String(port.into())),
        }
    }

    /// A plain heartbeat.
    pub fn beat() -> Self {
        Self {
            heartbeat: Some(Value::Bool(true)),
            port: None,
        }
    }

    /// A `heartbeat` field is present and not `false`.
    pub fn is_heartbeat(&self) -> bool {
        !matches!(self.heartbeat, None | Some(Value::Bool(false)))
    }

    /// The serving port, from a string or an unsigned integer.
    pub fn serving_port(&self) -> Option<String> {
        match &self.port {
            Some(Value::String(port)) if !port.is_empty() => Some(port.clone()),
            Some(Value::Number(n)) => n.as_u64().map(|n| n.to_string()),
            _ => None,
        }
    }
}
