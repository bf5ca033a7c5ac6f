//! Per-connection protocol handling.
//!
//! A handler reads one newline-terminated JSON line, decodes it into a
//! [`PushRequest`], writes a single status reply and closes the connection.
//! Only then is the request forwarded to the queue sink, so a slow or
//! failing sink never delays the client.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::queue::QueueSink;
use crate::request::{PushRequest, RequestRoot};

use super::errors::HandlerError;
use super::protocol::Reply;
use super::LISTENER_TARGET;

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream);
}

/// Protocol limits applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HandlerSettings {
    /// Longest accepted line in bytes, newline included.
    pub(crate) max_line_bytes: usize,
    /// Rejects requests without a device key.
    pub(crate) require_device_id: bool,
}

impl HandlerSettings {
    pub(crate) fn from_config(config: &pushwire_config::Config) -> Self {
        Self {
            max_line_bytes: config.max_line_bytes(),
            require_device_id: config.require_device_id(),
        }
    }
}

/// Handler that decodes push requests and forwards them to a queue sink.
pub(crate) struct PushConnectionHandler {
    sink: Arc<dyn QueueSink>,
    settings: HandlerSettings,
}

impl PushConnectionHandler {
    pub(crate) fn new(sink: Arc<dyn QueueSink>, settings: HandlerSettings) -> Self {
        Self { sink, settings }
    }

    /// Runs the protocol over `stream`, consuming it so that it is closed
    /// before the request reaches the sink.
    pub(crate) fn serve<S: Read + Write>(&self, mut stream: S, peer: Option<SocketAddr>) {
        let outcome = self.receive(&mut stream);
        let reply = match &outcome {
            Ok(_) => Reply::Ok,
            Err(error) => {
                log_failure(error, peer);
                error.reply()
            }
        };
        if let Err(error) = reply.write_to(&mut stream) {
            debug!(
                target: LISTENER_TARGET,
                peer = ?peer,
                error = %error,
                "failed to write reply"
            );
        }
        drop(stream);

        if let Ok(request) = outcome {
            self.forward(request, peer);
        }
    }

    fn receive<R: Read>(&self, stream: R) -> Result<PushRequest, HandlerError> {
        let line = read_request_line(stream, self.settings.max_line_bytes)?;
        let request = decode_request(&line)?;
        if self.settings.require_device_id && !request.has_device_id() {
            return Err(HandlerError::MissingDeviceId);
        }
        Ok(request)
    }

    fn forward(&self, request: PushRequest, peer: Option<SocketAddr>) {
        let has_device = request.has_device_id();
        match self.sink.submit(request) {
            Ok(()) => debug!(
                target: LISTENER_TARGET,
                peer = ?peer,
                has_device,
                "push request queued"
            ),
            Err(error) => error!(
                target: LISTENER_TARGET,
                peer = ?peer,
                error = %error,
                "failed to queue push request"
            ),
        }
    }
}

impl ConnectionHandler for PushConnectionHandler {
    fn handle(&self, stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        info!(target: LISTENER_TARGET, peer = ?peer, "client connected");
        self.serve(stream, peer);
    }
}

fn log_failure(error: &HandlerError, peer: Option<SocketAddr>) {
    match error {
        HandlerError::Overflow { limit } => warn!(
            target: LISTENER_TARGET,
            peer = ?peer,
            limit,
            "client sent more than the request limit without a newline; possible buffer overflow attempt"
        ),
        HandlerError::Read { .. } => warn!(
            target: LISTENER_TARGET,
            peer = ?peer,
            error = %error,
            "connection read failed"
        ),
        HandlerError::OutOfMemory { .. } => error!(
            target: LISTENER_TARGET,
            peer = ?peer,
            error = %error,
            "could not allocate push request"
        ),
        HandlerError::Parse { .. }
        | HandlerError::NotAnObject { .. }
        | HandlerError::MissingDeviceId => info!(
            target: LISTENER_TARGET,
            peer = ?peer,
            error = %error,
            "rejected push request"
        ),
    }
}

/// Reads up to `limit` bytes or the first newline, whichever comes first.
///
/// The newline counts towards the limit. Reaching the limit without one is an
/// overflow. End of stream before a newline yields whatever was received.
fn read_request_line<R: Read>(stream: R, limit: usize) -> Result<Vec<u8>, HandlerError> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX);
    let mut reader = BufReader::new(stream).take(cap);
    let mut line = Vec::new();
    reader
        .read_until(b'\n', &mut line)
        .map_err(|source| HandlerError::Read { source })?;

    if line.last() == Some(&b'\n') {
        line.pop();
        return Ok(line);
    }
    if line.len() >= limit {
        return Err(HandlerError::Overflow { limit });
    }
    Ok(line)
}

fn decode_request(line: &[u8]) -> Result<PushRequest, HandlerError> {
    let root: RequestRoot =
        serde_json::from_slice(line).map_err(|source| HandlerError::Parse { source })?;
    let pairs = match root {
        RequestRoot::Object(pairs) => pairs,
        RequestRoot::Other(found) => return Err(HandlerError::NotAnObject { found }),
    };

    let members = pairs.iter().map(|(key, value)| (key.as_str(), value));
    PushRequest::from_pairs(members, |ignored| {
        debug!(
            target: LISTENER_TARGET,
            key = ignored.key,
            reason = %ignored.reason,
            "ignoring request field"
        );
    })
    .map_err(|source| HandlerError::OutOfMemory { source })
}
