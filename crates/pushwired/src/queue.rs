//! Hand-off between connection handlers and push delivery.
//!
//! Handlers submit finished requests to a [`QueueSink`]. The daemon's sink is
//! a bounded channel drained by a [`DeliveryWorker`] thread, which passes each
//! request to a [`PushDispatcher`].

use std::io;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use thiserror::Error;
use tracing::{debug, info};

use crate::request::PushRequest;

const QUEUE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::queue");

/// Destination for decoded push requests.
pub trait QueueSink: Send + Sync {
    /// Accepts one request for later delivery.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the request cannot be queued. Callers log
    /// the failure; nothing retries it.
    fn submit(&self, request: PushRequest) -> Result<(), SinkError>;
}

/// Reasons a request could not be queued.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    /// Every queue slot is occupied.
    #[error("delivery queue is full ({capacity} requests pending)")]
    Full {
        /// Configured queue capacity.
        capacity: usize,
    },
    /// The delivery side has shut down.
    #[error("delivery queue is closed")]
    Closed,
}

/// Bounded in-memory queue sink.
///
/// Clones share one sender. [`ChannelSink::close`] drops it for every clone
/// at once, so the receiver finishes even while handlers still hold a sink.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Arc<Mutex<Option<SyncSender<PushRequest>>>>,
    capacity: usize,
}

impl ChannelSink {
    /// Creates a sink holding at most `capacity` requests (minimum one) and
    /// the receiver that drains it.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<PushRequest>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let sink = Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            capacity,
        };
        (sink, receiver)
    }

    /// Stops accepting requests. Requests already queued stay deliverable;
    /// later submissions fail with [`SinkError::Closed`].
    pub fn close(&self) {
        if self.sender().take().is_some() {
            debug!(target: QUEUE_TARGET, "delivery queue closed to new requests");
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<SyncSender<PushRequest>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueueSink for ChannelSink {
    fn submit(&self, request: PushRequest) -> Result<(), SinkError> {
        let guard = self.sender();
        let Some(sender) = guard.as_ref() else {
            return Err(SinkError::Closed);
        };
        sender.try_send(request).map_err(|error| match error {
            TrySendError::Full(_) => SinkError::Full {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => SinkError::Closed,
        })
    }
}

/// Final stage that hands requests to the push provider.
pub trait PushDispatcher: Send + 'static {
    /// Delivers one request.
    fn dispatch(&mut self, request: PushRequest);
}

/// Dispatcher that records each request in the structured log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDispatcher;

impl PushDispatcher for LoggingDispatcher {
    fn dispatch(&mut self, request: PushRequest) {
        let payload = serde_json::to_string(&request).unwrap_or_default();
        info!(
            target: QUEUE_TARGET,
            device = request.device_id.as_deref().unwrap_or("<none>"),
            badge = request.badge_number,
            payload = %payload,
            "push notification ready for delivery"
        );
    }
}

/// Background thread draining the queue into a dispatcher.
#[derive(Debug)]
pub struct DeliveryWorker {
    handle: thread::JoinHandle<usize>,
}

impl DeliveryWorker {
    /// Spawns the worker. It exits once the queue is empty and its sink has
    /// been closed or dropped.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the thread cannot be spawned.
    pub fn spawn<D>(receiver: Receiver<PushRequest>, mut dispatcher: D) -> io::Result<Self>
    where
        D: PushDispatcher,
    {
        let handle = thread::Builder::new()
            .name("pushwire-delivery".to_owned())
            .spawn(move || {
                let mut delivered = 0_usize;
                for request in receiver {
                    dispatcher.dispatch(request);
                    delivered += 1;
                }
                debug!(target: QUEUE_TARGET, delivered, "delivery queue drained");
                delivered
            })?;
        Ok(Self { handle })
    }

    /// Waits for the worker to drain and returns how many requests it
    /// dispatched, or `None` if the dispatcher panicked.
    #[must_use]
    pub fn join(self) -> Option<usize> {
        self.handle.join().ok()
    }
}
