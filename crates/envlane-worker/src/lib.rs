//! Envlane Session Worker
//!
//! One worker process per connection: it owns exactly one session state
//! machine and, through it, at most one environment handle. The worker
//! speaks length-prefixed frames over stdin/stdout with its supervising
//! connection handler and exits on the shutdown sentinel, channel EOF, or
//! a fatal collaborator fault.

pub mod serve;
pub mod session;

pub use serve::{serve, ServeError};
pub use session::{Session, SessionState};
