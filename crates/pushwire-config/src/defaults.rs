use crate::logging::LogFormat;

/// Interface the daemon binds when none is configured.
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// Port clients connect to when none is configured.
pub const DEFAULT_LISTEN_PORT: u16 = 9443;

/// Pending connections the kernel queues before refusing new ones.
pub const DEFAULT_BACKLOG: u32 = 16;

/// Maximum request line length in bytes, newline included.
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024;

/// Connection handlers allowed to run at once.
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Per-connection read timeout in milliseconds. Zero disables it.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;

/// Requests the in-memory delivery queue buffers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Time a graceful stop waits for in-flight handlers, in milliseconds.
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 5_000;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Returns [`DEFAULT_LOG_FILTER`].
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}
