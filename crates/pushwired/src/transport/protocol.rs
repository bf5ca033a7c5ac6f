//! Status replies written back to clients.
//!
//! Each connection receives exactly one reply before the server closes it.
//! Replies are bare ASCII tokens with no trailing newline; the overflow reply
//! is sent as two separate writes.

use std::io::{self, Write};

/// Status reply for a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    /// Request accepted and queued.
    Ok,
    /// Request could not be read or parsed.
    Error,
    /// Request parsed but the root value is not an object.
    WrongType,
    /// Building the request ran out of memory.
    NoMemory,
    /// Request line exceeded the configured limit.
    Overflow,
    /// Request lacks a device key while keys are required.
    MissingKey,
}

impl Reply {
    /// Payload segments, written in order.
    pub(crate) const fn segments(self) -> &'static [&'static [u8]] {
        match self {
            Self::Ok => &[b"ok"],
            Self::Error => &[b"err"],
            Self::WrongType => &[b"err_type"],
            Self::NoMemory => &[b"nomem"],
            Self::Overflow => &[b"err", b"overflow"],
            Self::MissingKey => &[b"err_key"],
        }
    }

    /// Writes the reply and flushes the stream.
    pub(crate) fn write_to<W: Write>(self, writer: &mut W) -> io::Result<()> {
        for segment in self.segments() {
            writer.write_all(segment)?;
        }
        writer.flush()
    }
}
