//! Environment collaborator surface.
//!
//! The service treats an environment as a capability-typed black box with
//! four operations. Concrete dynamics live behind this trait; the transport
//! layers never see anything but these calls and their wire-friendly
//! results.

use serde_json::{Map, Value};

use crate::space::Space;

/// Result of one `step` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Value,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Map<String, Value>,
}

/// Errors raised while constructing or operating an environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// The requested registry namespace does not exist.
    #[error("environment type '{0}' is not installed")]
    UnknownEnvType(String),

    /// No registered environment under this id.
    #[error("unknown environment id '{0}'")]
    UnknownEnvId(String),

    /// A construction kwarg was not understood or had the wrong shape.
    #[error("invalid kwarg '{key}': {reason}")]
    InvalidKwarg { key: String, reason: String },

    /// The supplied action is outside the action space.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// `step` or `render` was called before the first `reset`.
    #[error("environment not ready: {0}")]
    NotReady(String),

    /// The environment was already closed.
    #[error("environment is closed")]
    Closed,

    /// Internal environment fault.
    #[error("environment fault: {0}")]
    Fault(String),
}

/// A stateful simulation environment.
///
/// A handle is owned by exactly one worker unit and never called from more
/// than one thread; implementations do not need interior synchronization.
pub trait Environment: Send + std::fmt::Debug {
    /// Domain of observations returned by `reset` and `step`.
    fn observation_space(&self) -> Space;

    /// Domain of actions accepted by `step`.
    fn action_space(&self) -> Space;

    /// Nominal frames-per-second for rendered output, if meaningful.
    fn render_fps(&self) -> Option<f64> {
        None
    }

    /// Reset to an initial state, returning the first observation and an
    /// info map.
    fn reset(&mut self) -> Result<(Value, Map<String, Value>), EnvError>;

    /// Advance one step under `action`.
    fn step(&mut self, action: &Value) -> Result<StepOutcome, EnvError>;

    /// Render the current state as an image value.
    fn render(&mut self) -> Result<Value, EnvError>;

    /// Release any held resources. Called at most once; further operations
    /// on the handle fail.
    fn close(&mut self);
}
