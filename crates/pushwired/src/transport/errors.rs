//! Error types for the listener and connection handlers.

use std::collections::TryReserveError;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use super::protocol::Reply;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Resolving the configured host failed.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded but produced no usable address.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// Creating or configuring the stream socket failed.
    #[error("failed to create listening socket for {addr}: {source}")]
    SocketCreate {
        /// Address the socket was created for.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Binding the socket to the configured address failed.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Switching the bound socket into listening mode failed.
    #[error("failed to listen on {addr} with backlog {backlog}: {source}")]
    Listen {
        /// Bound address.
        addr: SocketAddr,
        /// Requested kernel backlog.
        backlog: u32,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Enabling non-blocking accept failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be spawned.
    #[error("failed to start listener thread: {source}")]
    ThreadStart {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The accept loop stopped on a non-transient error.
    #[error("listener stopped after accept failure: {source}")]
    Accept {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}

/// Failures that end a single connection.
#[derive(Debug, Error)]
pub(crate) enum HandlerError {
    #[error("request exceeded {limit} bytes without a newline")]
    Overflow { limit: usize },
    #[error("failed to read request: {source}")]
    Read {
        #[source]
        source: io::Error,
    },
    #[error("malformed request JSON: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("failed to allocate push request: {source}")]
    OutOfMemory {
        #[source]
        source: TryReserveError,
    },
    #[error("request does not name a target device")]
    MissingDeviceId,
}

impl HandlerError {
    /// Reply the client receives for this failure.
    pub(crate) const fn reply(&self) -> Reply {
        match self {
            Self::Overflow { .. } => Reply::Overflow,
            Self::Read { .. } | Self::Parse { .. } => Reply::Error,
            Self::NotAnObject { .. } => Reply::WrongType,
            Self::OutOfMemory { .. } => Reply::NoMemory,
            Self::MissingDeviceId => Reply::MissingKey,
        }
    }
}
