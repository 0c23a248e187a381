//! TCP reachability probe run before any SSH handshake.

use std::time::Duration;

use log::debug;
use tokio::net::TcpStream;

/// Check whether `host:port` accepts a TCP connection within `timeout`.
///
/// The socket is closed immediately. Any error, including a timeout or an
/// unresolvable host, yields `false`.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            debug!("probe {}:{} failed: {}", host, port, e);
            false
        }
        Err(_) => {
            debug!("probe {}:{} timed out after {:?}", host, port, timeout);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(probe("127.0.0.1", port, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(!probe("127.0.0.1", port, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_unresolvable_host() {
        assert!(!probe("host.invalid", 22, Duration::from_millis(500)).await);
    }
}
