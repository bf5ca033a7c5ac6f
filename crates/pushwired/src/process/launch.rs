//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use pushwire_config::Config;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::queue::{ChannelSink, DeliveryWorker, LoggingDispatcher, PushDispatcher};
use crate::telemetry;
use crate::transport::{
    HandlerSettings, ListenerHandle, ListenerSettings, PushConnectionHandler, SocketListener,
    StopMode,
};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when startup fails or the listener stops
/// abnormally.
pub fn run_daemon() -> Result<(), LaunchError> {
    let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());
    run_daemon_with(
        &SystemConfigLoader,
        reporter,
        &SystemShutdownSignal::new(),
        LoggingDispatcher,
    )
}

/// Runs the daemon with injected collaborators.
///
/// Blocks until `shutdown` returns, then stops accepting, drains in-flight
/// connections for the configured budget and waits for the delivery worker
/// to empty the queue.
///
/// # Errors
///
/// Returns [`LaunchError`] when startup fails or the listener stops
/// abnormally.
pub fn run_daemon_with<D>(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
    dispatcher: D,
) -> Result<(), LaunchError>
where
    D: PushDispatcher,
{
    reporter.bootstrap_starting();
    let runtime = match Runtime::start(loader, dispatcher) {
        Ok(runtime) => runtime,
        Err(error) => {
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };
    reporter.listener_ready(&runtime.config, runtime.listener.local_addr());

    let waited = shutdown.wait();
    reporter.shutdown_requested();
    let (stopped, delivered) = runtime.stop();
    reporter.listener_stopped(delivered);

    waited?;
    stopped?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

struct Runtime {
    config: Config,
    listener: ListenerHandle,
    sink: ChannelSink,
    worker: DeliveryWorker,
}

impl Runtime {
    fn start<D: PushDispatcher>(
        loader: &dyn ConfigLoader,
        dispatcher: D,
    ) -> Result<Self, LaunchError> {
        let config = loader.load()?;
        telemetry::initialise(&config)?;
        info!(
            target: PROCESS_TARGET,
            host = config.listen_address().0,
            port = config.listen_address().1,
            "starting daemon runtime"
        );

        let (sink, receiver) = ChannelSink::bounded(config.queue_capacity());
        let worker = DeliveryWorker::spawn(receiver, dispatcher)
            .map_err(|source| LaunchError::Worker { source })?;
        let handler = Arc::new(PushConnectionHandler::new(
            Arc::new(sink.clone()),
            HandlerSettings::from_config(&config),
        ));

        // On a bind failure every sink clone drops here and the worker exits
        // on its own.
        let listener = SocketListener::bind(&ListenerSettings::from_config(&config))?;
        let listener = listener.start(handler)?;
        Ok(Self {
            config,
            listener,
            sink,
            worker,
        })
    }

    fn stop(self) -> (Result<(), LaunchError>, Option<usize>) {
        let Self {
            config,
            listener,
            sink,
            worker,
        } = self;
        info!(
            target: PROCESS_TARGET,
            active_connections = listener.active_connections(),
            drain_timeout_ms = config.drain_timeout().as_millis(),
            "stopping listener"
        );
        let stopped = listener
            .stop(StopMode::Graceful {
                drain_timeout: config.drain_timeout(),
            })
            .map_err(LaunchError::from);
        // Handlers abandoned after the drain budget still hold clones of the
        // sink; closing it lets the worker finish without them.
        sink.close();
        let delivered = worker.join();
        (stopped, delivered)
    }
}
