//! Environment Collaborator Surface
//!
//! The runtime side of the space schema, the `Environment` trait the worker
//! drives, and the built-in environment registry. Everything here runs
//! inside a session's worker process; nothing touches sockets or frames.

pub mod codec;
pub mod demo;
pub mod env;
pub mod faulty;
pub mod registry;
pub mod space;

pub use codec::{decode_space, encode_space, SpaceCodecError};
pub use env::{EnvError, Environment, StepOutcome};
pub use registry::build_env;
pub use space::Space;
