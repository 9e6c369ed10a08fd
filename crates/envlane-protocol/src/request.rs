//! Client request envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One client request: `{"type": ..., "payload": {...}}` on the wire.
///
/// The set of request kinds is closed. An unknown `type` string fails
/// deserialization, which the worker answers with a protocol error rather
/// than falling through to a default arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Request {
    /// Construct an environment, replacing any previously bound one.
    Make {
        env_id: String,
        #[serde(default)]
        env_type: Option<String>,
        #[serde(default)]
        kwargs: Map<String, Value>,
    },
    /// Reset the bound environment to an initial state.
    Reset {},
    /// Advance the bound environment by one action.
    Step { action: Value },
    /// Render the current state as an image.
    Render {},
    /// Close the bound environment and end the session.
    Close {},
}

impl Request {
    /// Request kind as it appears on the wire, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Make { .. } => "make",
            Request::Reset {} => "reset",
            Request::Step { .. } => "step",
            Request::Render {} => "render",
            Request::Close {} => "close",
        }
    }
}
