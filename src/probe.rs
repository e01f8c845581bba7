//! TCP reachability probe.
//!
//! Waits for a dependent service to accept connections after a reset. Connects
//! are retried until the deadline has passed, with a last attempt right at the
//! deadline. At least one attempt is always made, so a zero timeout means
//! "try once".

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::config::ProbeConfig;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{addr} not reachable after {elapsed_ms}ms: {source}")]
    Unreachable {
        addr: String,
        elapsed_ms: u64,
        #[source]
        source: io::Error,
    },
}

/// Waits until `host:port` accepts a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub interval: Duration,
}

impl From<&ProbeConfig> for TcpProbe {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            timeout: config.timeout(),
            interval: config.interval(),
        }
    }
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration, interval: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            interval,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry connecting until the port is open or the deadline has passed.
    ///
    /// Each attempt may wait up to `max(remaining, interval)` for the connect
    /// to complete, so the last attempt can end up to one interval past the
    /// deadline.
    pub async fn wait(&self) -> Result<(), ProbeError> {
        let addr = self.addr();
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let budget = deadline
                .saturating_duration_since(Instant::now())
                .max(self.interval);

            let connect = TcpStream::connect(addr.as_str());
            let err = match tokio::time::timeout(budget, connect).await {
                Ok(Ok(_stream)) => {
                    tracing::debug!(
                        %addr,
                        attempts,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Port is open"
                    );
                    return Ok(());
                }
                Ok(Err(e)) => e,
                Err(_) => io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ProbeError::Unreachable {
                    addr,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    source: err,
                });
            }

            tracing::trace!(%addr, attempts, error = %err, "Port not open yet");
            tokio::time::sleep(self.interval.min(remaining)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// A loopback port with nothing listening on it.
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_open_port_succeeds() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpProbe::new(
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            Duration::from_millis(10),
        );
        probe.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_port_fails_after_timeout() {
        let port = closed_port().await;
        let probe = TcpProbe::new(
            "127.0.0.1",
            port,
            Duration::from_millis(200),
            Duration::from_millis(20),
        );

        let started = std::time::Instant::now();
        let err = probe.wait().await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));

        let ProbeError::Unreachable { addr, .. } = err;
        assert_eq!(addr, format!("127.0.0.1:{}", port));
    }

    #[tokio::test]
    async fn test_zero_timeout_tries_once() {
        let port = closed_port().await;
        let probe = TcpProbe::new("127.0.0.1", port, Duration::ZERO, Duration::from_millis(50));
        assert!(probe.wait().await.is_err());
    }

    #[tokio::test]
    async fn test_port_opening_late_is_detected() {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        drop(std_listener);

        let opener = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let listener = TcpListener::bind(addr).await.unwrap();
            // Keep the listener alive long enough for the probe to connect
            let _ = tokio::time::timeout(Duration::from_secs(5), listener.accept()).await;
        });

        let probe = TcpProbe::new(
            "127.0.0.1",
            addr.port(),
            Duration::from_secs(5),
            Duration::from_millis(20),
        );
        probe.wait().await.unwrap();
        opener.await.unwrap();
    }

    #[tokio::test]
    async fn test_last_attempt_at_deadline() {
        // Attempts at ~0ms and ~400ms miss the port; the one at the 600ms
        // deadline must still be made.
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        drop(std_listener);

        let opener = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let listener = TcpListener::bind(addr).await.unwrap();
            let _ = tokio::time::timeout(Duration::from_secs(5), listener.accept()).await;
        });

        let probe = TcpProbe::new(
            "127.0.0.1",
            addr.port(),
            Duration::from_millis(600),
            Duration::from_millis(400),
        );
        probe.wait().await.unwrap();
        opener.await.unwrap();
    }

    #[test]
    fn test_from_config() {
        let config = ProbeConfig {
            container: "nextcloud".to_string(),
            host: "nextcloud".to_string(),
            port: 1337,
            timeout_seconds: 60,
            interval_ms: 500,
        };
        let probe = TcpProbe::from(&config);
        assert_eq!(probe.addr(), "nextcloud:1337");
        assert_eq!(probe.timeout, Duration::from_secs(60));
        assert_eq!(probe.interval, Duration::from_millis(500));
    }
}
