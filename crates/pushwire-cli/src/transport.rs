//! TCP transport helpers for the pushwire client.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::AppError;

pub(super) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) fn connect(host: &str, port: u16) -> Result<TcpStream, AppError> {
    let endpoint = format!("{host}:{port}");
    let address = resolve_tcp_address(host, port).map_err(|source| AppError::Resolve {
        endpoint: endpoint.clone(),
        source,
    })?;

    TcpStream::connect_timeout(&address, CONNECTION_TIMEOUT)
        .map_err(|source| AppError::Connect { endpoint, source })
}

/// Writes `line` and reads the reply until the daemon closes the connection.
///
/// The write half is shut down after sending so the daemon sees end of
/// stream even if it is still waiting for a newline.
pub(super) fn exchange(stream: &mut TcpStream, line: &[u8]) -> Result<String, AppError> {
    stream.write_all(line).map_err(AppError::SendRequest)?;
    stream.flush().map_err(AppError::SendRequest)?;
    if let Err(error) = stream.shutdown(Shutdown::Write) {
        // The daemon may have answered and closed already.
        if error.kind() != io::ErrorKind::NotConnected {
            return Err(AppError::SendRequest(error));
        }
    }
    let mut reply = String::new();
    stream
        .read_to_string(&mut reply)
        .map_err(AppError::ReadResponse)?;
    Ok(reply)
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}
