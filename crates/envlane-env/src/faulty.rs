//! Fault-injection environment.
//!
//! Registered as `faulty-env`. Used to exercise the supervision paths: a
//! collaborator error, a worker-killing panic, and a worker that drags its
//! feet on shutdown. Construction always succeeds; the configured fault
//! fires on `step` (or `close` for the slow mode).

use std::thread;
use std::time::Duration;

use serde_json::{Map, Value};

use envlane_protocol::{Dtype, Tensor};

use crate::env::{EnvError, Environment, StepOutcome};
use crate::space::Space;

/// What goes wrong, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultMode {
    /// `step` returns a collaborator error; the session survives.
    Error,
    /// `step` panics, taking the worker process down mid-call.
    Panic,
    /// Calls succeed, but `close` stalls for `delay_ms`.
    SlowClose,
}

/// Environment that fails on demand.
#[derive(Debug)]
pub struct FaultyEnv {
    mode: FaultMode,
    delay: Duration,
    closed: bool,
}

impl FaultyEnv {
    /// Construct from `make` kwargs. Recognized keys: `mode` (`"error"`,
    /// `"panic"`, `"slow-close"`), `delay_ms`, `render_mode`.
    pub fn from_kwargs(kwargs: &Map<String, Value>) -> Result<Self, EnvError> {
        let mut mode = FaultMode::Error;
        let mut delay = Duration::from_secs(10);

        for (key, value) in kwargs {
            match key.as_str() {
                "mode" => {
                    mode = match value.as_str() {
                        Some("error") => FaultMode::Error,
                        Some("panic") => FaultMode::Panic,
                        Some("slow-close") => FaultMode::SlowClose,
                        _ => {
                            return Err(EnvError::InvalidKwarg {
                                key: key.clone(),
                                reason: format!(
                                    "expected \"error\", \"panic\" or \"slow-close\", got {}",
                                    value
                                ),
                            })
                        }
                    };
                }
                "delay_ms" => {
                    let millis = value.as_u64().ok_or_else(|| EnvError::InvalidKwarg {
                        key: key.clone(),
                        reason: format!("expected milliseconds, got {}", value),
                    })?;
                    delay = Duration::from_millis(millis);
                }
                "render_mode" => {}
                _ => {
                    return Err(EnvError::InvalidKwarg {
                        key: key.clone(),
                        reason: "unrecognized option".to_string(),
                    });
                }
            }
        }

        Ok(Self { mode, delay, closed: false })
    }

    fn observation(&self) -> Value {
        Tensor::new(vec![1], Dtype::F64, vec![0.0])
            .map(|t| t.to_value())
            .unwrap_or(Value::Null)
    }
}

impl Environment for FaultyEnv {
    fn observation_space(&self) -> Space {
        Space::Box {
            low: vec![0.0],
            high: vec![1.0],
            shape: vec![1],
            dtype: Dtype::F64,
        }
    }

    fn action_space(&self) -> Space {
        Space::Discrete { n: 1 }
    }

    fn reset(&mut self) -> Result<(Value, Map<String, Value>), EnvError> {
        if self.closed {
            return Err(EnvError::Closed);
        }
        Ok((self.observation(), Map::new()))
    }

    fn step(&mut self, _action: &Value) -> Result<StepOutcome, EnvError> {
        if self.closed {
            return Err(EnvError::Closed);
        }
        match self.mode {
            FaultMode::Error => Err(EnvError::Fault("injected step failure".to_string())),
            FaultMode::Panic => panic!("injected worker panic"),
            FaultMode::SlowClose => Ok(StepOutcome {
                observation: self.observation(),
                reward: 0.0,
                terminated: false,
                truncated: false,
                info: Map::new(),
            }),
        }
    }

    fn render(&mut self) -> Result<Value, EnvError> {
        if self.closed {
            return Err(EnvError::Closed);
        }
        Ok(self.observation())
    }

    fn close(&mut self) {
        if self.mode == FaultMode::SlowClose && !self.closed {
            thread::sleep(self.delay);
        }
        self.closed = true;
    }
}
