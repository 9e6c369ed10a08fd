//! Blocking client stub.
//!
//! One socket, one logical session: each call sends exactly one request
//! frame and blocks until the single response frame arrives. Request and
//! response correlate by strict alternation; there are no request ids.

use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use serde_json::{Map, Value};

use envlane_env::{decode_space, Space, StepOutcome};
use envlane_protocol::{frame, FrameError, Reply, Request, Response};

/// Errors surfaced to client callers.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Framing failure on the response stream.
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    /// The server closed the connection instead of answering.
    #[error("server closed the connection")]
    Disconnected,

    /// The response was not what this call expects.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server reported a failure; message and trace are server-supplied.
    #[error("{message}")]
    Remote { message: String, traceback: String },
}

/// Arguments for `make`.
#[derive(Debug, Clone)]
pub struct MakeSpec {
    pub env_id: String,
    pub env_type: Option<String>,
    pub kwargs: Map<String, Value>,
}

impl MakeSpec {
    /// Spec for the given environment id with default options.
    pub fn new(env_id: impl Into<String>) -> Self {
        Self {
            env_id: env_id.into(),
            env_type: None,
            kwargs: Map::new(),
        }
    }

    /// Select a registry namespace.
    pub fn env_type(mut self, env_type: impl Into<String>) -> Self {
        self.env_type = Some(env_type.into());
        self
    }

    /// Add a construction kwarg.
    pub fn kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }
}

/// What `make` reports about the bound environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvHandleInfo {
    pub observation_space: Space,
    pub action_space: Space,
    pub render_fps: Option<f64>,
}

/// A remote environment session over one TCP connection.
pub struct RemoteEnv {
    stream: TcpStream,
}

impl RemoteEnv {
    /// Connect to a server. No request is sent until the first call.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self { stream })
    }

    /// Construct an environment on the server, replacing any prior one in
    /// this session. Rendering defaults to `rgb_array` unless the spec says
    /// otherwise.
    pub fn make(&mut self, spec: &MakeSpec) -> Result<EnvHandleInfo, ClientError> {
        let mut kwargs = spec.kwargs.clone();
        kwargs
            .entry("render_mode".to_string())
            .or_insert_with(|| Value::from("rgb_array"));

        let reply = self.call(&Request::Make {
            env_id: spec.env_id.clone(),
            env_type: spec.env_type.clone(),
            kwargs,
        })?;

        match reply {
            Reply::Made { observation_space, action_space, render_fps } => {
                let observation_space = decode_space(&observation_space)
                    .map_err(|e| ClientError::Protocol(e.to_string()))?;
                let action_space = decode_space(&action_space)
                    .map_err(|e| ClientError::Protocol(e.to_string()))?;
                Ok(EnvHandleInfo {
                    observation_space,
                    action_space,
                    render_fps,
                })
            }
            other => Err(unexpected("make", &other)),
        }
    }

    /// Reset the remote environment.
    pub fn reset(&mut self) -> Result<(Value, Value), ClientError> {
        match self.call(&Request::Reset {})? {
            Reply::Reset { observation, info } => Ok((observation, info)),
            other => Err(unexpected("reset", &other)),
        }
    }

    /// Step the remote environment with the given action.
    pub fn step(&mut self, action: Value) -> Result<StepOutcome, ClientError> {
        match self.call(&Request::Step { action })? {
            Reply::Stepped { observation, reward, terminated, truncated, info } => {
                let info = match info {
                    Value::Object(map) => map,
                    other => {
                        return Err(ClientError::Protocol(format!(
                            "step info is not a mapping: {}",
                            other
                        )))
                    }
                };
                Ok(StepOutcome {
                    observation,
                    reward,
                    terminated,
                    truncated,
                    info,
                })
            }
            other => Err(unexpected("step", &other)),
        }
    }

    /// Render the remote environment's current state.
    pub fn render(&mut self) -> Result<Value, ClientError> {
        match self.call(&Request::Render {})? {
            Reply::Rendered { image } => Ok(image),
            other => Err(unexpected("render", &other)),
        }
    }

    /// Close the remote environment and end the session.
    pub fn close(mut self) -> Result<(), ClientError> {
        match self.call(&Request::Close {})? {
            Reply::Closed {} => {
                let _ = self.stream.shutdown(Shutdown::Both);
                Ok(())
            }
            other => Err(unexpected("close", &other)),
        }
    }

    /// Send one request, wait for its one response.
    fn call(&mut self, request: &Request) -> Result<Reply, ClientError> {
        let encoded = serde_json::to_vec(request)
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        frame::write_frame(&mut self.stream, &encoded)?;

        let payload = frame::read_frame(&mut self.stream)?.ok_or(ClientError::Disconnected)?;
        let response: Response = serde_json::from_slice(&payload)
            .map_err(|e| ClientError::Protocol(format!("malformed response: {}", e)))?;

        match response {
            Response::Ok { reply } => Ok(reply),
            Response::Error { message, traceback } => {
                Err(ClientError::Remote { message, traceback })
            }
        }
    }
}

fn unexpected(call: &str, reply: &Reply) -> ClientError {
    ClientError::Protocol(format!("unexpected reply shape for {}: {:?}", call, reply))
}
