//! Worker supervision.
//!
//! Each accepted connection gets one isolated worker unit owning that
//! session's environment. The supervisor owns spawning, the framed
//! bidirectional channel, and the bounded-time teardown protocol: ask via
//! the shutdown sentinel, wait, escalate to signals, then kill.

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use envlane_protocol::{frame, traceback, FrameError, Request, Response};
use envlane_worker::Session;

/// Name of the worker binary, resolved from `$PATH` as a last resort.
pub const WORKER_BIN: &str = "envlane-worker";

/// Environment variable overriding the worker binary location.
pub const WORKER_ENV_VAR: &str = "ENVLANE_WORKER";

/// Poll interval while waiting for a worker to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Grace period between SIGTERM and the final kill.
const TERM_GRACE: Duration = Duration::from_millis(500);

/// Errors surfaced by a worker channel.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The worker process could not be started.
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(#[source] io::Error),

    /// The worker died before delivering a response.
    #[error("worker terminated unexpectedly")]
    WorkerGone,

    /// The channel itself failed.
    #[error("worker channel error: {0}")]
    Channel(#[from] FrameError),
}

/// How a worker left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Exited on its own within the timeout.
    Clean,
    /// Had to be signalled or killed.
    Forced,
}

/// Bidirectional message channel to one worker unit.
///
/// One request frame in, one response frame out, strictly alternating.
/// `shutdown` asks the worker to release its environment and exit, bounded
/// by the timeout; the implementation must reclaim the worker either way.
pub trait WorkerChannel: Send {
    /// Forward one request frame to the worker, verbatim.
    fn send(&mut self, payload: &[u8]) -> Result<(), SupervisorError>;

    /// Wait for the worker's next response frame.
    fn recv(&mut self) -> Result<Vec<u8>, SupervisorError>;

    /// Tear the worker down, waiting up to `timeout` for a clean exit.
    fn shutdown(self: Box<Self>, timeout: Duration) -> ShutdownOutcome;
}

/// Worker unit backed by a child process; the production implementation.
#[derive(Debug)]
pub struct ProcessWorker {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
}

impl ProcessWorker {
    /// Spawn a worker process and wire up its framed stdio channel.
    /// stderr is inherited so worker logs land next to server logs.
    pub fn spawn(program: &PathBuf) -> Result<Self, SupervisorError> {
        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(SupervisorError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            SupervisorError::SpawnFailed(io::Error::new(
                io::ErrorKind::Other,
                "worker stdin was not captured",
            ))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            SupervisorError::SpawnFailed(io::Error::new(
                io::ErrorKind::Other,
                "worker stdout was not captured",
            ))
        })?;

        log::debug!("spawned worker pid {}", child.id());
        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout,
        })
    }

    /// Locate the worker binary: explicit override, then a sibling of the
    /// current executable (covers cargo-built trees), then `$PATH`.
    pub fn default_command() -> PathBuf {
        if let Some(path) = env::var_os(WORKER_ENV_VAR) {
            return PathBuf::from(path);
        }

        if let Ok(exe) = env::current_exe() {
            for dir in exe.ancestors().skip(1).take(2) {
                let candidate = dir.join(WORKER_BIN);
                if candidate.is_file() {
                    return candidate;
                }
            }
        }

        PathBuf::from(WORKER_BIN)
    }

    /// Worker process id, for logs.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl WorkerChannel for ProcessWorker {
    fn send(&mut self, payload: &[u8]) -> Result<(), SupervisorError> {
        let stdin = self.stdin.as_mut().ok_or(SupervisorError::WorkerGone)?;
        frame::write_frame(stdin, payload).map_err(|e| match e {
            FrameError::Io(ref io_err) if io_err.kind() == io::ErrorKind::BrokenPipe => {
                SupervisorError::WorkerGone
            }
            other => SupervisorError::Channel(other),
        })
    }

    fn recv(&mut self) -> Result<Vec<u8>, SupervisorError> {
        match frame::read_frame(&mut self.stdout)? {
            Some(payload) => Ok(payload),
            None => Err(SupervisorError::WorkerGone),
        }
    }

    fn shutdown(mut self: Box<Self>, timeout: Duration) -> ShutdownOutcome {
        let pid = self.pid();

        // Ask politely: the empty frame is the shutdown sentinel. Dropping
        // stdin afterwards doubles as EOF for a worker mid-read.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = frame::write_frame(&mut stdin, &[]);
        }

        if wait_for_exit(&mut self.child, timeout) {
            log::debug!("worker pid {} exited cleanly", pid);
            return ShutdownOutcome::Clean;
        }

        log::warn!(
            "worker pid {} did not exit within {:?}, reclaiming",
            pid,
            timeout
        );
        terminate(&mut self.child);
        ShutdownOutcome::Forced
    }
}

impl Drop for ProcessWorker {
    /// Last-resort reclaim for paths that never reach `shutdown`.
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Worker unit backed by an in-process thread.
///
/// No process boundary: a misbehaving environment shares the server's
/// address space. Panics still stay confined to the worker thread, so the
/// channel semantics match `ProcessWorker`. Meant for tests and
/// single-tenant embedding; the server defaults to process workers.
pub struct ThreadWorker {
    requests: mpsc::Sender<Vec<u8>>,
    responses: mpsc::Receiver<Vec<u8>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    /// Start a session loop on its own thread.
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<Vec<u8>>();
        let (response_tx, response_rx) = mpsc::channel::<Vec<u8>>();

        let handle = thread::spawn(move || {
            let mut session = Session::new();
            while let Ok(payload) = request_rx.recv() {
                if payload.is_empty() {
                    break;
                }
                let response = match serde_json::from_slice::<Request>(&payload) {
                    Ok(request) => session.handle(request),
                    Err(e) => Response::error(
                        format!("invalid request: {}", e),
                        traceback::render(&e),
                    ),
                };
                let encoded = match serde_json::to_vec(&response) {
                    Ok(bytes) => bytes,
                    Err(_) => break,
                };
                if response_tx.send(encoded).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: request_tx,
            responses: response_rx,
            handle: Some(handle),
        }
    }
}

impl WorkerChannel for ThreadWorker {
    fn send(&mut self, payload: &[u8]) -> Result<(), SupervisorError> {
        self.requests
            .send(payload.to_vec())
            .map_err(|_| SupervisorError::WorkerGone)
    }

    fn recv(&mut self) -> Result<Vec<u8>, SupervisorError> {
        self.responses.recv().map_err(|_| SupervisorError::WorkerGone)
    }

    fn shutdown(mut self: Box<Self>, timeout: Duration) -> ShutdownOutcome {
        let _ = self.requests.send(Vec::new());
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return ShutdownOutcome::Clean,
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                // A thread cannot be reclaimed by force; it is left to die
                // with the process.
                log::warn!("thread worker ignored shutdown for {:?}", timeout);
                return ShutdownOutcome::Forced;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
        let _ = handle.join();
        ShutdownOutcome::Clean
    }
}

/// Poll for process exit until the deadline. Returns whether it exited.
fn wait_for_exit(child: &mut Child, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(_) => return false,
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Terminate a worker gracefully then forcefully.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(child.id() as i32);
        let _ = signal::kill(pid, Signal::SIGTERM);
        if wait_for_exit(child, TERM_GRACE) {
            return;
        }
    }

    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_prefers_env_override() {
        // Serialize env mutation against other tests in this module.
        let previous = env::var_os(WORKER_ENV_VAR);
        env::set_var(WORKER_ENV_VAR, "/tmp/custom-worker");
        let command = ProcessWorker::default_command();
        match previous {
            Some(value) => env::set_var(WORKER_ENV_VAR, value),
            None => env::remove_var(WORKER_ENV_VAR),
        }
        assert_eq!(command, PathBuf::from("/tmp/custom-worker"));
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let err = ProcessWorker::spawn(&PathBuf::from("/no/such/binary")).unwrap_err();
        assert!(matches!(err, SupervisorError::SpawnFailed(_)));
    }

    #[test]
    fn test_worker_gone_message_is_client_facing() {
        // The handler forwards this text to the client verbatim.
        assert_eq!(
            SupervisorError::WorkerGone.to_string(),
            "worker terminated unexpectedly"
        );
    }

    fn request_bytes(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_thread_worker_round_trip() {
        let mut worker: Box<dyn WorkerChannel> = Box::new(ThreadWorker::spawn());

        worker
            .send(&request_bytes(serde_json::json!({
                "type": "make",
                "payload": {"env_id": "demo-env"}
            })))
            .unwrap();
        let response: Response = serde_json::from_slice(&worker.recv().unwrap()).unwrap();
        assert!(matches!(response, Response::Ok { .. }));

        assert_eq!(
            worker.shutdown(Duration::from_secs(1)),
            ShutdownOutcome::Clean
        );
    }

    #[test]
    fn test_thread_worker_panic_breaks_channel() {
        let mut worker: Box<dyn WorkerChannel> = Box::new(ThreadWorker::spawn());

        worker
            .send(&request_bytes(serde_json::json!({
                "type": "make",
                "payload": {"env_id": "faulty-env", "kwargs": {"mode": "panic"}}
            })))
            .unwrap();
        let response: Response = serde_json::from_slice(&worker.recv().unwrap()).unwrap();
        assert!(matches!(response, Response::Ok { .. }));

        worker
            .send(&request_bytes(serde_json::json!({
                "type": "step",
                "payload": {"action": 0}
            })))
            .unwrap();
        let err = worker.recv().unwrap_err();
        assert!(matches!(err, SupervisorError::WorkerGone));

        // Reclaim still reports cleanly; the thread is already dead.
        assert_eq!(
            worker.shutdown(Duration::from_secs(1)),
            ShutdownOutcome::Clean
        );
    }

    #[test]
    fn test_thread_worker_shutdown_without_traffic() {
        let worker: Box<dyn WorkerChannel> = Box::new(ThreadWorker::spawn());
        assert_eq!(
            worker.shutdown(Duration::from_secs(1)),
            ShutdownOutcome::Clean
        );
    }
}
