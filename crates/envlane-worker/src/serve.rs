//! Worker-side serve loop.
//!
//! Reads framed requests from the supervisor channel, dispatches them into
//! the session, and writes framed responses back, strictly alternating.
//! The empty frame is the shutdown sentinel; EOF on the channel means the
//! supervisor is gone and has the same effect.

use std::io::{Read, Write};

use envlane_protocol::{frame, traceback, FrameError, Request, Response};

use crate::session::Session;

/// Errors that end the serve loop abnormally.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The channel to the supervisor failed.
    #[error("worker channel failed: {0}")]
    Channel(#[from] FrameError),

    /// A response could not be serialized.
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Run one session over the given channel until shutdown.
///
/// Malformed or unknown requests are answered with error responses and do
/// not end the loop; only channel failure does. The session's environment
/// handle is released on every exit path, including unwinds.
pub fn serve<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<(), ServeError> {
    let mut session = Session::new();

    loop {
        let payload = match frame::read_frame(reader)? {
            None => {
                log::info!("supervisor channel closed, exiting");
                break;
            }
            Some(payload) => payload,
        };

        if payload.is_empty() {
            log::info!("shutdown sentinel received, exiting");
            break;
        }

        let response = match serde_json::from_slice::<Request>(&payload) {
            Ok(request) => {
                log::debug!("handling '{}' request", request.kind());
                session.handle(request)
            }
            Err(e) => Response::error(
                format!("invalid request: {}", e),
                traceback::render(&e),
            ),
        };

        let encoded = serde_json::to_vec(&response)?;
        frame::write_frame(writer, &encoded)?;
    }

    Ok(())
}
