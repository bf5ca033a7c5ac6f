//! TCP listener that fans accepted connections out to handler threads.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, info, warn};

use pushwire_config::Config;

use super::limiter::{ConnectionLimiter, ConnectionPermit};
use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);

/// Socket and admission settings for the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListenerSettings {
    host: String,
    port: u16,
    backlog: u32,
    max_connections: usize,
    read_timeout: Option<Duration>,
}

impl ListenerSettings {
    #[cfg(test)]
    pub(crate) fn new(host: impl Into<String>, port: u16) -> Self {
        let defaults = Config::default();
        Self {
            host: host.into(),
            port,
            backlog: defaults.backlog(),
            max_connections: defaults.max_connections(),
            read_timeout: defaults.read_timeout(),
        }
    }

    pub(crate) fn from_config(config: &Config) -> Self {
        let (host, port) = config.listen_address();
        Self {
            host: host.to_owned(),
            port,
            backlog: config.backlog(),
            max_connections: config.max_connections(),
            read_timeout: config.read_timeout(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// How [`ListenerHandle::stop`] treats handlers that are still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopMode {
    /// Close the listening socket and abandon in-flight handlers.
    Immediate,
    /// Close the listening socket, then wait up to `drain_timeout` for
    /// in-flight handlers to finish.
    Graceful {
        /// Upper bound on the wait for running handlers.
        drain_timeout: Duration,
    },
}

/// Bound, listening TCP socket that has not started accepting yet.
#[derive(Debug)]
pub(crate) struct SocketListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    limiter: Arc<ConnectionLimiter>,
    read_timeout: Option<Duration>,
}

impl SocketListener {
    pub(crate) fn bind(settings: &ListenerSettings) -> Result<Self, ListenerError> {
        let addr = resolve_tcp(&settings.host, settings.port)?;
        let listener = listen_tcp(addr, settings.backlog)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind { addr, source })?;
        Ok(Self {
            listener,
            local_addr,
            limiter: ConnectionLimiter::new(settings.max_connections),
            read_timeout: settings.read_timeout,
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop on a dedicated thread and returns immediately.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let limiter = Arc::clone(&self.limiter);
        let local_addr = self.local_addr;
        let handle = thread::Builder::new()
            .name("pushwire-accept".to_owned())
            .spawn(move || run_accept_loop(&self, &shutdown_flag, &handler))
            .map_err(|source| ListenerError::ThreadStart { source })?;

        Ok(ListenerHandle {
            shutdown,
            limiter,
            local_addr,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept thread.
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    limiter: Arc<ConnectionLimiter>,
    local_addr: SocketAddr,
    handle: Option<thread::JoinHandle<Result<(), ListenerError>>>,
}

impl ListenerHandle {
    /// Address the listener is bound to.
    #[must_use]
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connection handlers currently running.
    #[must_use]
    pub(crate) fn active_connections(&self) -> usize {
        self.limiter.active()
    }

    /// Asks the accept loop to exit at its next poll.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept thread and reports how it ended.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Accept`] when the loop stopped on a fatal
    /// accept failure and [`ListenerError::ThreadPanic`] when it panicked.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(Err(ListenerError::ThreadPanic)),
            None => Ok(()),
        }
    }

    /// Stops accepting connections and closes the listening socket.
    ///
    /// # Errors
    ///
    /// Propagates the accept loop's exit status from [`Self::join`].
    pub(crate) fn stop(self, mode: StopMode) -> Result<(), ListenerError> {
        self.shutdown();
        let limiter = Arc::clone(&self.limiter);
        let result = self.join();

        match mode {
            StopMode::Immediate => {
                let abandoned = limiter.active();
                if abandoned > 0 {
                    warn!(
                        target: LISTENER_TARGET,
                        abandoned,
                        "listener stopped with handlers still running"
                    );
                }
            }
            StopMode::Graceful { drain_timeout } => {
                if !limiter.wait_idle(drain_timeout) {
                    warn!(
                        target: LISTENER_TARGET,
                        active = limiter.active(),
                        drain_timeout_ms = drain_timeout.as_millis(),
                        "drain timeout elapsed with handlers still running"
                    );
                }
            }
        }
        result
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &AtomicBool,
    handler: &Arc<dyn ConnectionHandler>,
) -> Result<(), ListenerError> {
    info!(
        target: LISTENER_TARGET,
        address = %listener.local_addr,
        max_connections = listener.limiter.capacity(),
        "socket listener active"
    );
    let mut saturated = false;
    while !shutdown.load(Ordering::SeqCst) {
        let Some(permit) = listener.limiter.try_acquire() else {
            if !saturated {
                debug!(
                    target: LISTENER_TARGET,
                    active = listener.limiter.active(),
                    "connection limit reached; deferring accept"
                );
            }
            saturated = true;
            thread::sleep(ACCEPT_BACKOFF);
            continue;
        };
        saturated = false;

        match listener.listener.accept() {
            Ok((stream, peer)) => {
                dispatch_connection(stream, peer, permit, handler, listener.read_timeout);
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                drop(permit);
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) if is_transient(&error) => {}
            Err(source) => {
                error!(
                    target: LISTENER_TARGET,
                    error = %source,
                    "accept failed; closing listener"
                );
                return Err(ListenerError::Accept { source });
            }
        }
    }

    info!(
        target: LISTENER_TARGET,
        address = %listener.local_addr,
        "socket listener stopped"
    );
    Ok(())
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
    )
}

fn dispatch_connection(
    stream: TcpStream,
    peer: SocketAddr,
    permit: ConnectionPermit,
    handler: &Arc<dyn ConnectionHandler>,
    read_timeout: Option<Duration>,
) {
    if let Err(error) = prepare_stream(&stream, read_timeout) {
        warn!(
            target: LISTENER_TARGET,
            peer = %peer,
            error = %error,
            "failed to configure accepted connection"
        );
        return;
    }

    let handler = Arc::clone(handler);
    let spawned = thread::Builder::new()
        .name(format!("pushwire-conn-{peer}"))
        .spawn(move || {
            let _permit = permit;
            handler.handle(stream);
        });
    if let Err(error) = spawned {
        warn!(
            target: LISTENER_TARGET,
            peer = %peer,
            error = %error,
            "failed to spawn connection handler"
        );
    }
}

fn prepare_stream(stream: &TcpStream, read_timeout: Option<Duration>) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(read_timeout)
}

fn resolve_tcp(host: &str, port: u16) -> Result<SocketAddr, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })
}

fn listen_tcp(addr: SocketAddr, backlog: u32) -> Result<TcpListener, ListenerError> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|source| ListenerError::SocketCreate { addr, source })?;
    socket
        .set_reuse_address(true)
        .map_err(|source| ListenerError::SocketCreate { addr, source })?;
    socket
        .bind(&addr.into())
        .map_err(|source| ListenerError::Bind { addr, source })?;
    let kernel_backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
    socket
        .listen(kernel_backlog)
        .map_err(|source| ListenerError::Listen {
            addr,
            backlog,
            source,
        })?;
    Ok(socket.into())
}
