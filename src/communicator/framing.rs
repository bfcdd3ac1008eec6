//! Length-prefixed JSON framing.
//!
//! Every message is a 4-byte **little-endian** `u32` length followed by that
//! many bytes of UTF-8 JSON.
//!
//! ```text
//! +----------------+------------------+
//! | Length (4B LE) | JSON Payload     |
//! +----------------+------------------+
//! ```

use std::io::{ErrorKind, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, SimLinkError};

/// Largest frame accepted in either direction (64 MiB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Whether an I/O error means the peer is gone rather than misbehaving
pub(crate) fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
    )
}

/// Read one framed message.
///
/// Returns `Ok(None)` when the peer disconnected, including in the middle
/// of a frame.
pub fn read_message<T: DeserializeOwned>(reader: &mut impl Read) -> Result<Option<T>> {
    let mut len_buf = [0u8; 4];
    if !read_frame_part(reader, &mut len_buf)? {
        return Ok(None);
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(SimLinkError::MalformedResponse(format!(
            "Frame of {len} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit"
        )));
    }

    let mut payload = vec![0u8; len];
    if !read_frame_part(reader, &mut payload)? {
        tracing::debug!("Peer disconnected inside a {len} byte frame");
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Fill `buf`; `Ok(false)` when the peer went away first
fn read_frame_part(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if is_disconnect(&e) => Ok(false),
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Err(
            SimLinkError::Timeout("The simulation took too long to respond".to_string()),
        ),
        Err(e) => Err(SimLinkError::Io(e)),
    }
}

/// Write one framed message and flush
pub fn write_message<T: Serialize>(writer: &mut impl Write, msg: &T) -> Result<()> {
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(SimLinkError::Config(format!(
            "Outgoing frame of {} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit",
            payload.len()
        )));
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| SimLinkError::Config("Outgoing frame too large".to_string()))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}
