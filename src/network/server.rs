//! Host side of a connection
//!
//! The host binds immediately, then its worker waits for exactly one
//! challenger, polling so a stop request is noticed while nobody connects.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

use super::connection::{Connection, ConnectionResult};
use super::{NetError, NetResult};
use crate::config::NetworkConfig;

/// Bind the configured port and start waiting for the client
pub fn listen(config: &NetworkConfig) -> NetResult<Connection> {
    let bind_addr = format!("{}:{}", config.bind_address, config.port);
    let listener = std::net::TcpListener::bind(&bind_addr).map_err(|e| {
        NetError::BindFailed(format!("Failed to bind to {}: {}", bind_addr, e))
    })?;
    listener.set_nonblocking(true)?;

    let local_addr = listener.local_addr()?;
    tracing::info!("Waiting for a challenger on {}", local_addr);

    let poll = Duration::from_millis(config.accept_poll_ms.max(1));
    Connection::spawn("artattack-host", config, Some(local_addr), move |running| {
        accept_one(listener, poll, running)
    })
}

async fn accept_one(
    listener: std::net::TcpListener,
    poll: Duration,
    running: Arc<AtomicBool>,
) -> ConnectionResult<Option<(TcpStream, SocketAddr)>> {
    let listener = TcpListener::from_std(listener)?;

    while running.load(Ordering::SeqCst) {
        match tokio::time::timeout(poll, listener.accept()).await {
            Ok(Ok((stream, addr))) => {
                tracing::info!("New connection from {}", addr);
                return Ok(Some((stream, addr)));
            }
            Ok(Err(e)) => {
                tracing::warn!("Accept error: {}", e);
                tokio::time::sleep(poll).await;
            }
            Err(_) => {}
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Transport;

    fn any_port() -> NetworkConfig {
        NetworkConfig {
            port: 0,
            bind_address: "127.0.0.1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_listen_binds_immediately() {
        let mut conn = listen(&any_port()).unwrap();
        let addr = conn.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(conn.try_receive().is_none());
        conn.shutdown();
        assert!(!conn.is_running());
    }

    #[test]
    fn test_bind_conflict_is_reported() {
        let conn = listen(&any_port()).unwrap();
        let taken = NetworkConfig {
            port: conn.local_addr().unwrap().port(),
            ..any_port()
        };
        assert!(matches!(listen(&taken), Err(NetError::BindFailed(_))));
    }
}
