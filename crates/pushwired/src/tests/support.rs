//! Shared doubles for the daemon behaviour suites.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockall::mock;
use ortho_config::{OrthoConfig, OrthoError};

use pushwire_config::Config;

use crate::bootstrap::ConfigLoader;
use crate::health::HealthReporter;
use crate::process::{LaunchError, ShutdownError, ShutdownSignal};
use crate::queue::{PushDispatcher, QueueSink, SinkError};
use crate::request::PushRequest;

/// Lifecycle events captured by [`RecordingHealthReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    ListenerReady(SocketAddr),
    BootstrapFailed(String),
    ShutdownRequested,
    ListenerStopped(Option<usize>),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Address announced by `listener_ready`, if the daemon got that far.
    #[must_use]
    pub fn ready_address(&self) -> Option<SocketAddr> {
        self.events().into_iter().find_map(|event| match event {
            HealthEvent::ListenerReady(addr) => Some(addr),
            _ => None,
        })
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn listener_ready(&self, _config: &Config, address: SocketAddr) {
        self.record(HealthEvent::ListenerReady(address));
    }

    fn bootstrap_failed(&self, error: &LaunchError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn shutdown_requested(&self) {
        self.record(HealthEvent::ShutdownRequested);
    }

    fn listener_stopped(&self, delivered: Option<usize>) {
        self.record(HealthEvent::ListenerStopped(delivered));
    }
}

/// Loopback configuration on an ephemeral port with a short drain budget.
#[must_use]
pub fn loopback_config() -> Config {
    Config {
        listen_host: "127.0.0.1".to_owned(),
        listen_port: 0,
        drain_timeout_ms: 2_000,
        log_filter: "warn".to_owned(),
        ..Config::default()
    }
}

/// Loader that rejects a malformed command-line flag.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("pushwired"),
            OsString::from("--listen-port"),
            OsString::from("not-a-port"),
        ])
    }
}

/// Shutdown signal released by sending on a channel.
pub struct ChannelShutdownSignal {
    receiver: Mutex<Receiver<()>>,
}

impl ChannelShutdownSignal {
    #[must_use]
    pub fn new() -> (Sender<()>, Self) {
        let (sender, receiver) = mpsc::channel();
        (
            sender,
            Self {
                receiver: Mutex::new(receiver),
            },
        )
    }
}

impl ShutdownSignal for ChannelShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        // A dropped sender also counts as a shutdown request.
        let _ = self
            .receiver
            .lock()
            .expect("shutdown receiver mutex poisoned")
            .recv();
        Ok(())
    }
}

/// Dispatcher that keeps delivered requests for inspection.
#[derive(Clone, Default)]
pub struct CollectingDispatcher {
    delivered: Arc<Mutex<Vec<PushRequest>>>,
}

impl CollectingDispatcher {
    #[must_use]
    pub fn delivered(&self) -> Vec<PushRequest> {
        self.delivered
            .lock()
            .expect("dispatcher mutex poisoned")
            .clone()
    }
}

impl PushDispatcher for CollectingDispatcher {
    fn dispatch(&mut self, request: PushRequest) {
        self.delivered
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(request);
    }
}

mock! {
    pub Sink {}

    impl QueueSink for Sink {
        fn submit(&self, request: PushRequest) -> Result<(), SinkError>;
    }
}

/// Sends `payload` as a client would and returns the full reply.
pub fn exchange(addr: SocketAddr, payload: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect to daemon");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set client read timeout");
    stream.write_all(payload).expect("write request");
    // Ignore failures here: the server may already have closed after an
    // overflow reply.
    let _ = stream.shutdown(Shutdown::Write);
    let mut reply = String::new();
    stream.read_to_string(&mut reply).expect("read reply");
    reply
}
