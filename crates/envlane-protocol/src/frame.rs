//! Length-prefixed wire framing.
//!
//! Every message on the wire is a 4-byte big-endian payload length followed
//! by exactly that many payload bytes. The payload is opaque at this layer;
//! what the bytes mean is the concern of the layer above.

use std::io::{self, Read, Write};

/// Errors raised by the frame codec.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream closed partway through a payload.
    #[error("frame truncated: expected {expected} payload bytes, got {read}")]
    Truncated { expected: usize, read: usize },

    /// The payload is too large to describe with the u32 length header.
    #[error("payload of {0} bytes exceeds the u32 frame header")]
    Oversize(usize),

    /// Underlying I/O failure.
    #[error("frame I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Write one frame: length header followed by the payload bytes.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::Oversize(payload.len()))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame, looping over partial reads until the header-declared
/// payload length is satisfied.
///
/// Returns `Ok(None)` when the stream closes before the header is complete:
/// that is the orderly end-of-connection signal. A close inside the payload
/// is a framing error.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError> {
    let mut header = [0u8; 4];
    if fill(reader, &mut header)? < header.len() {
        return Ok(None);
    }

    let expected = u32::from_be_bytes(header) as usize;
    let mut payload = vec![0u8; expected];
    let read = fill(reader, &mut payload)?;
    if read < expected {
        return Err(FrameError::Truncated { expected, read });
    }
    Ok(Some(payload))
}

/// Read into `buf` until it is full. Returns the number of bytes read, which
/// is less than `buf.len()` only if the stream hit EOF first.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(read)
}
