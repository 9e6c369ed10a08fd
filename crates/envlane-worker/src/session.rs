//! Per-session request dispatch.
//!
//! One session owns at most one environment handle and enforces legal call
//! ordering. Collaborator failures are caught at the call site and turned
//! into error responses; they never tear the session down.

use serde_json::{Map, Value};

use envlane_env::{build_env, encode_space, Environment};
use envlane_protocol::{traceback, Reply, Request, Response};

const NOT_INITIALIZED: &str = "Environment not initialized. Send 'make' first.";
const TERMINATED: &str = "session terminated: environment already closed";

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No environment bound yet; only `make` is legal.
    Uninitialized,
    /// An environment is bound and operable.
    Ready,
    /// The environment was closed. Terminal: every further request fails.
    Terminated,
}

/// One session's state machine.
pub struct Session {
    env: Option<Box<dyn Environment>>,
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self {
            env: None,
            state: SessionState::Uninitialized,
        }
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Dispatch one request, returning exactly one response. Never panics on
    /// its own behalf; a panic out of here is a collaborator fault and ends
    /// the worker process, which is what process isolation is for.
    pub fn handle(&mut self, request: Request) -> Response {
        if self.state == SessionState::Terminated {
            return Response::error(TERMINATED, "");
        }

        match request {
            Request::Make { env_id, env_type, kwargs } => {
                self.handle_make(&env_id, env_type.as_deref(), &kwargs)
            }
            Request::Reset {} => match self.env.as_mut() {
                None => Response::error(NOT_INITIALIZED, ""),
                Some(env) => match env.reset() {
                    Ok((observation, info)) => Response::ok(Reply::Reset {
                        observation,
                        info: Value::Object(info),
                    }),
                    Err(e) => fail(&e),
                },
            },
            Request::Step { action } => match self.env.as_mut() {
                None => Response::error(NOT_INITIALIZED, ""),
                Some(env) => match env.step(&action) {
                    Ok(outcome) => Response::ok(Reply::Stepped {
                        observation: outcome.observation,
                        reward: outcome.reward,
                        terminated: outcome.terminated,
                        truncated: outcome.truncated,
                        info: Value::Object(outcome.info),
                    }),
                    Err(e) => fail(&e),
                },
            },
            Request::Render {} => match self.env.as_mut() {
                None => Response::error(NOT_INITIALIZED, ""),
                Some(env) => match env.render() {
                    Ok(image) => Response::ok(Reply::Rendered { image }),
                    Err(e) => fail(&e),
                },
            },
            Request::Close {} => match self.env.take() {
                None => Response::error(NOT_INITIALIZED, ""),
                Some(mut env) => {
                    env.close();
                    self.state = SessionState::Terminated;
                    Response::ok(Reply::Closed {})
                }
            },
        }
    }

    fn handle_make(
        &mut self,
        env_id: &str,
        env_type: Option<&str>,
        kwargs: &Map<String, Value>,
    ) -> Response {
        // Release the prior handle before constructing its replacement; a
        // failed reconstruction leaves the session uninitialized rather
        // than bound to a closed environment.
        if let Some(mut old) = self.env.take() {
            old.close();
        }
        self.state = SessionState::Uninitialized;

        let env = match build_env(env_id, env_type, kwargs) {
            Ok(env) => env,
            Err(e) => return fail(&e),
        };

        let observation_space = match encode_space(&env.observation_space()) {
            Ok(descriptor) => descriptor,
            Err(e) => return fail(&e),
        };
        let action_space = match encode_space(&env.action_space()) {
            Ok(descriptor) => descriptor,
            Err(e) => return fail(&e),
        };
        let render_fps = env.render_fps();

        self.env = Some(env);
        self.state = SessionState::Ready;
        Response::ok(Reply::Made {
            observation_space,
            action_space,
            render_fps,
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    /// Scoped release: whatever way the worker exits, a bound environment
    /// handle gets closed.
    fn drop(&mut self) {
        if let Some(mut env) = self.env.take() {
            env.close();
        }
    }
}

fn fail(err: &(dyn std::error::Error + 'static)) -> Response {
    Response::error(err.to_string(), traceback::render(err))
}
