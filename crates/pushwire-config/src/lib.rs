//! Shared configuration for the pushwire daemon and client.
//!
//! Values are layered by [`ortho_config`]: built-in defaults first, then a
//! TOML file named by `--config-path` or `PUSHWIRE_CONFIG_PATH`, then
//! `PUSHWIRE_*` environment variables, and finally command-line flags.

mod defaults;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_BACKLOG, DEFAULT_DRAIN_TIMEOUT_MS, DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_LINE_BYTES, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_READ_TIMEOUT_MS, default_log_filter, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration for the pushwire binaries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PUSHWIRE")]
#[serde(default)]
pub struct Config {
    /// Host name or address the listener binds.
    pub listen_host: String,
    /// TCP port the listener binds.
    pub listen_port: u16,
    /// Kernel backlog passed to `listen(2)`.
    pub backlog: u32,
    /// Longest accepted request line in bytes, newline included.
    pub max_line_bytes: usize,
    /// Connection handlers allowed to run concurrently.
    pub max_connections: usize,
    /// Read timeout applied to accepted connections; `0` disables it.
    pub read_timeout_ms: u64,
    /// Capacity of the in-memory delivery queue.
    pub queue_capacity: usize,
    /// Budget a graceful stop spends waiting for in-flight handlers.
    pub drain_timeout_ms: u64,
    /// Rejects requests that do not name a target device.
    pub require_device_id: bool,
    /// `tracing` filter expression.
    pub log_filter: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: DEFAULT_LISTEN_HOST.to_owned(),
            listen_port: DEFAULT_LISTEN_PORT,
            backlog: DEFAULT_BACKLOG,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
            require_device_id: false,
            log_filter: default_log_filter().to_owned(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Host and port the listener binds.
    #[must_use]
    pub const fn listen_address(&self) -> (&str, u16) {
        (self.listen_host.as_str(), self.listen_port)
    }

    /// Kernel listen backlog.
    #[must_use]
    pub const fn backlog(&self) -> u32 {
        self.backlog
    }

    /// Longest accepted request line in bytes.
    #[must_use]
    pub const fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Upper bound on concurrently running connection handlers.
    #[must_use]
    pub const fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Read timeout for accepted connections, or `None` when disabled.
    #[must_use]
    pub const fn read_timeout(&self) -> Option<Duration> {
        match self.read_timeout_ms {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    /// Capacity of the in-memory delivery queue.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Time a graceful stop waits for handlers to finish.
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Whether requests must carry a device key.
    #[must_use]
    pub const fn require_device_id(&self) -> bool {
        self.require_device_id
    }

    /// Log filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
