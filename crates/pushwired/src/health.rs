//! Structured health reporting for daemon lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use pushwire_config::Config;

use crate::process::LaunchError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked once the listener accepts connections.
    fn listener_ready(&self, config: &Config, address: SocketAddr);

    /// Invoked when startup fails.
    fn bootstrap_failed(&self, error: &LaunchError);

    /// Invoked when a shutdown signal arrives.
    fn shutdown_requested(&self);

    /// Invoked after the listener and delivery worker have stopped.
    fn listener_stopped(&self, delivered: Option<usize>);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn listener_ready(&self, config: &Config, address: SocketAddr) {
        (**self).listener_ready(config, address);
    }

    fn bootstrap_failed(&self, error: &LaunchError) {
        (**self).bootstrap_failed(error);
    }

    fn shutdown_requested(&self) {
        (**self).shutdown_requested();
    }

    fn listener_stopped(&self, delivered: Option<usize>) {
        (**self).listener_stopped(delivered);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting pushwire daemon"
        );
    }

    fn listener_ready(&self, config: &Config, address: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_ready",
            address = %address,
            backlog = config.backlog(),
            max_connections = config.max_connections(),
            max_line_bytes = config.max_line_bytes(),
            require_device_id = config.require_device_id(),
            log_format = %config.log_format(),
            "listening for push clients"
        );
    }

    fn bootstrap_failed(&self, error: &LaunchError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon startup failed"
        );
    }

    fn shutdown_requested(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_requested",
            "stopping pushwire daemon"
        );
    }

    fn listener_stopped(&self, delivered: Option<usize>) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_stopped",
            delivered = ?delivered,
            "pushwire daemon stopped"
        );
    }
}
