//! Push notification intake daemon.
//!
//! Clients connect over TCP and send a single newline-terminated JSON object
//! describing a notification. The daemon decodes it into a [`PushRequest`],
//! answers with a short status token (`ok`, `err`, `err_type`, `nomem` or
//! `err_key`), closes the connection and hands the request to a
//! [`QueueSink`] for delivery.
//!
//! Startup is driven by [`run_daemon`]: configuration is loaded through
//! [`pushwire_config`], structured telemetry is installed, and the listener
//! runs until a termination signal arrives. Lifecycle events flow through a
//! [`HealthReporter`] so operators can follow bootstrap and shutdown in the
//! logs.

mod bootstrap;
mod health;
mod process;
mod queue;
mod request;
mod telemetry;
mod transport;

pub use bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon,
    run_daemon_with,
};
pub use queue::{
    ChannelSink, DeliveryWorker, LoggingDispatcher, PushDispatcher, QueueSink, SinkError,
};
pub use request::{IgnoreReason, IgnoredField, PushRequest};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
