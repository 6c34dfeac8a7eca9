use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One real-time event on the wire, in either direction.
///
/// ```json
/// { "event": "chat:message", "args": ["hello", { "room": 4 }] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Frame {
    pub fn new(event: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            args,
        }
    }
}
