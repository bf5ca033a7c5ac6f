//! TCP transport for push clients.
//!
//! The listener binds the configured endpoint and accepts connections on a
//! background thread. Each admitted connection runs on its own handler thread
//! behind a bounded admission gate.

mod errors;
mod handler;
mod limiter;
mod listener;
#[cfg(test)]
mod listener_tests;
mod protocol;
#[cfg(test)]
pub(crate) mod test_utils;

pub use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, HandlerSettings, PushConnectionHandler};
pub(crate) use self::listener::{ListenerHandle, ListenerSettings, SocketListener, StopMode};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
