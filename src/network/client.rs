//! Client side of a connection
//!
//! The client makes a single connection attempt from its worker; failure is
//! reported as an `Err` event rather than retried.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use super::connection::{Connection, ConnectionError, ConnectionResult};
use super::{resolve_host, NetError, NetResult};
use crate::config::NetworkConfig;

/// Split `HOST[:PORT]`, falling back to `default_port`
pub fn parse_remote(remote: &str, default_port: u16) -> NetResult<(String, u16)> {
    let remote = remote.trim();
    if remote.is_empty() {
        return Err(NetError::InvalidAddress("empty host".to_string()));
    }

    // Bracketed IPv6, e.g. [::1]:9067
    if let Some(rest) = remote.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| NetError::InvalidAddress(remote.to_string()))?;
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(port, remote)?,
            None if tail.is_empty() => default_port,
            None => return Err(NetError::InvalidAddress(remote.to_string())),
        };
        return Ok((host.to_string(), port));
    }

    match remote.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => Ok((host.to_string(), parse_port(port, remote)?)),
        _ => Ok((remote.to_string(), default_port)),
    }
}

fn parse_port(port: &str, remote: &str) -> NetResult<u16> {
    port.parse()
        .map_err(|_| NetError::InvalidAddress(format!("bad port in {}", remote)))
}

/// Start connecting to the host
pub fn connect(host: &str, port: u16, config: &NetworkConfig) -> NetResult<Connection> {
    let host = host.to_string();
    let timeout = Duration::from_millis(config.connect_timeout_ms);
    let poll = Duration::from_millis(config.io_poll_ms.max(1));

    tracing::info!("Connecting to {}:{}", host, port);
    Connection::spawn("artattack-client", config, None, move |running| {
        dial(host, port, timeout, poll, running)
    })
}

async fn dial(
    host: String,
    port: u16,
    timeout: Duration,
    poll: Duration,
    running: Arc<AtomicBool>,
) -> ConnectionResult<Option<(TcpStream, SocketAddr)>> {
    let display = format!("{}:{}", host, port);
    let addr = resolve_host(&host, port)
        .await
        .map_err(|source| ConnectionError::Connect {
            addr: display.clone(),
            source,
        })?;

    let attempt = tokio::time::timeout(timeout, TcpStream::connect(addr));
    tokio::pin!(attempt);

    loop {
        tokio::select! {
            result = &mut attempt => {
                return match result {
                    Ok(Ok(stream)) => Ok(Some((stream, addr))),
                    Ok(Err(source)) => Err(ConnectionError::Connect { addr: display, source }),
                    Err(_) => Err(ConnectionError::ConnectTimeout(display)),
                };
            }
            _ = tokio::time::sleep(poll) => {
                if !running.load(Ordering::SeqCst) {
                    return Ok(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Transport;
    use crate::protocol::{FailureKind, Frame, Message};

    #[test]
    fn test_parse_remote() {
        assert_eq!(parse_remote("example.org", 9067).unwrap(), ("example.org".to_string(), 9067));
        assert_eq!(parse_remote("10.0.0.2:4000", 9067).unwrap(), ("10.0.0.2".to_string(), 4000));
        assert_eq!(parse_remote("[::1]:4000", 9067).unwrap(), ("::1".to_string(), 4000));
        assert_eq!(parse_remote("[::1]", 9067).unwrap(), ("::1".to_string(), 9067));
        assert_eq!(parse_remote("::1", 9067).unwrap(), ("::1".to_string(), 9067));
        assert!(parse_remote("host:notaport", 9067).is_err());
        assert!(parse_remote("", 9067).is_err());
    }

    #[test]
    fn test_refused_connection_reports_one_error() {
        // Grab a free port, then release it so nothing is listening there
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let mut conn = connect("127.0.0.1", port, &NetworkConfig::default()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let frame = loop {
            if let Some(frame) = conn.try_receive() {
                break frame;
            }
            assert!(std::time::Instant::now() < deadline, "no error reported");
            std::thread::sleep(Duration::from_millis(10));
        };

        match frame {
            Frame::Message(Message::Err(failure)) => assert_eq!(failure.kind, FailureKind::Transport),
            other => panic!("expected an error, got {:?}", other),
        }
        std::thread::sleep(Duration::from_millis(50));
        assert!(conn.try_receive().is_none());
    }
}
