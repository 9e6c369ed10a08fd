//! TCP listener and per-connection handler.
//!
//! The listener accepts indefinitely and hands each connection to its own
//! handler thread. A handler owns exactly one worker unit and runs the
//! read-forward-reply loop; it never parses request payloads, only frames.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use uuid::Uuid;

use envlane_protocol::{frame, FrameError, Response};

use crate::supervisor::{
    ProcessWorker, ShutdownOutcome, SupervisorError, ThreadWorker, WorkerChannel,
};

/// How each session's worker unit is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerMode {
    /// One isolated child process per connection. The default: a crash,
    /// hang, or memory fault in one session cannot touch the others.
    #[default]
    Process,
    /// One in-process thread per connection. No fault-isolation boundary;
    /// for tests and single-tenant embedding.
    Thread,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Bound on how long a worker may take to exit once asked.
    pub shutdown_timeout: Duration,
    /// How session workers are hosted.
    pub worker_mode: WorkerMode,
    /// Worker binary override; defaults to the standard lookup.
    pub worker_command: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 65432,
            shutdown_timeout: Duration::from_secs(5),
            worker_mode: WorkerMode::Process,
            worker_command: None,
        }
    }
}

/// The listening server.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
}

impl Server {
    /// Bind the listening socket. This is the only fatal startup step.
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))?;
        Ok(Self { listener, config })
    }

    /// Address actually bound (resolves port 0 for tests).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the process is terminated. Each connection
    /// runs on its own thread; accept errors are logged and skipped so one
    /// bad handshake cannot stop the listener.
    pub fn run(&self) -> io::Result<()> {
        let worker_command = match self.config.worker_mode {
            WorkerMode::Process => {
                let command = self
                    .config
                    .worker_command
                    .clone()
                    .unwrap_or_else(ProcessWorker::default_command);
                log::info!("worker command: {}", command.display());
                Some(command)
            }
            WorkerMode::Thread => None,
        };

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let command = worker_command.clone();
                    let timeout = self.config.shutdown_timeout;
                    let session_id = Uuid::new_v4();
                    let builder =
                        thread::Builder::new().name(format!("session-{}", session_id));
                    let spawned = builder.spawn(move || {
                        handle_connection(session_id, stream, command.as_ref(), timeout);
                    });
                    if let Err(e) = spawned {
                        log::error!("failed to spawn handler thread: {}", e);
                    }
                }
                Err(e) => {
                    log::warn!("accept failed: {}", e);
                }
            }
        }
        Ok(())
    }
}

fn handle_connection(
    session_id: Uuid,
    mut stream: TcpStream,
    worker_command: Option<&PathBuf>,
    shutdown_timeout: Duration,
) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    log::info!("session {}: connection from {}", session_id, peer);

    let worker: Box<dyn WorkerChannel> = match worker_command {
        Some(command) => match ProcessWorker::spawn(command) {
            Ok(worker) => Box::new(worker),
            Err(e) => {
                log::error!("session {}: {}", session_id, e);
                // Answer the first request, if any, so the client sees why.
                if let Ok(Some(_)) = frame::read_frame(&mut stream) {
                    send_error(&mut stream, &e);
                }
                return;
            }
        },
        None => Box::new(ThreadWorker::spawn()),
    };

    drive(session_id, &mut stream, worker, shutdown_timeout);
    log::info!("session {}: closed", session_id);
}

/// The read-forward-reply loop. Strict request/response alternation: one
/// frame from the client, one frame to the worker, one frame back, one
/// frame to the client, in that order, until end of stream.
fn drive(
    session_id: Uuid,
    stream: &mut TcpStream,
    mut worker: Box<dyn WorkerChannel>,
    shutdown_timeout: Duration,
) {
    loop {
        let request = match frame::read_frame(stream) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                log::debug!("session {}: client closed", session_id);
                break;
            }
            Err(FrameError::Truncated { expected, read }) => {
                // Abrupt disconnect mid-message; nobody left to answer.
                log::warn!(
                    "session {}: request truncated ({}/{} bytes), tearing down",
                    session_id,
                    read,
                    expected
                );
                break;
            }
            Err(e) => {
                log::warn!("session {}: read failed: {}", session_id, e);
                break;
            }
        };

        if let Err(e) = worker.send(&request) {
            log::error!("session {}: {}", session_id, e);
            send_error(stream, &e);
            reclaim(session_id, worker, shutdown_timeout);
            return;
        }

        let response = match worker.recv() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("session {}: {}", session_id, e);
                send_error(stream, &e);
                reclaim(session_id, worker, shutdown_timeout);
                return;
            }
        };

        if let Err(e) = frame::write_frame(stream, &response) {
            log::warn!("session {}: write failed: {}", session_id, e);
            break;
        }
    }

    reclaim(session_id, worker, shutdown_timeout);
}

fn reclaim(session_id: Uuid, worker: Box<dyn WorkerChannel>, timeout: Duration) {
    match worker.shutdown(timeout) {
        ShutdownOutcome::Clean => {
            log::debug!("session {}: worker exited cleanly", session_id);
        }
        ShutdownOutcome::Forced => {
            log::warn!("session {}: worker was forcibly reclaimed", session_id);
        }
    }
}

/// Best-effort error envelope to a client that may already be gone.
fn send_error(stream: &mut TcpStream, err: &SupervisorError) {
    let response = Response::error(err.to_string(), "");
    if let Ok(encoded) = serde_json::to_vec(&response) {
        let _ = frame::write_frame(stream, &encoded);
    }
}
