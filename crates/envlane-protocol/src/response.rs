//! Server response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::space::SpaceDescriptor;

/// One server response, discriminated by the `status` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    /// Successful call; the reply fields sit beside the status tag.
    Ok {
        #[serde(flatten)]
        reply: Reply,
    },
    /// Failed call, carrying a human-readable message and a diagnostic trace.
    Error { message: String, traceback: String },
}

impl Response {
    /// Wrap a reply body in a success envelope.
    pub fn ok(reply: Reply) -> Self {
        Response::Ok { reply }
    }

    /// Build an error envelope.
    pub fn error(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
            traceback: traceback.into(),
        }
    }
}

/// Per-operation reply bodies.
///
/// There is no wire discriminant beyond the field shape: strict
/// request/response alternation means the caller always knows which body it
/// is waiting for. Variants are ordered most-specific first so untagged
/// deserialization resolves unambiguously; `Closed` matches the empty body
/// and must stay last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    /// Reply to `make`.
    Made {
        observation_space: SpaceDescriptor,
        action_space: SpaceDescriptor,
        render_fps: Option<f64>,
    },
    /// Reply to `step`.
    Stepped {
        observation: Value,
        reward: f64,
        terminated: bool,
        truncated: bool,
        info: Value,
    },
    /// Reply to `reset`.
    Reset { observation: Value, info: Value },
    /// Reply to `render`.
    Rendered { image: Value },
    /// Reply to `close`.
    Closed {},
}
