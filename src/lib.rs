//! Envlane - Remote Simulation Environment Service
//!
//! Exposes stateful, step-oriented simulation environments to remote
//! callers over a length-prefixed TCP protocol, with one supervised worker
//! process per connection so a fault in one session's environment cannot
//! touch the listener or any other session.

pub mod client;
pub mod server;
pub mod supervisor;

pub use client::{ClientError, EnvHandleInfo, MakeSpec, RemoteEnv};
pub use server::{Server, ServerConfig, WorkerMode};
pub use supervisor::{
    ProcessWorker, ShutdownOutcome, SupervisorError, ThreadWorker, WorkerChannel,
};
