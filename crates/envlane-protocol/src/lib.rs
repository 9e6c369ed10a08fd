//! Envlane Wire Protocol
//!
//! Defines the length-prefixed frame codec and the JSON message schema
//! exchanged between clients, the server, and session workers. This crate
//! holds no I/O policy beyond framing and knows nothing about how
//! environments are built or run.

pub mod frame;
pub mod request;
pub mod response;
pub mod space;
pub mod tensor;
pub mod traceback;

pub use frame::{read_frame, write_frame, FrameError};
pub use request::Request;
pub use response::{Reply, Response};
pub use space::{DictEntries, SpaceDescriptor};
pub use tensor::{Dtype, Tensor, TensorError};

/// Wire schema version. Bump on any incompatible change to the envelope or
/// descriptor shapes.
pub const WIRE_VERSION: u32 = 1;
