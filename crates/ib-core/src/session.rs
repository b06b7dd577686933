//! Shared broker session proxy
//!
//! One `SessionProxy` exists per server process. All tool handlers reach the
//! gateway through it, never through the underlying client directly. A single
//! mutex around the client linearizes broker traffic, which keeps the
//! single-outstanding-request discipline of the gateway protocol regardless
//! of how many transport requests are in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{BrokerClient, BrokerConnector};
use crate::error::{BrokerError, Result};

/// Identity and connection state of the session, as reported to tools.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub host: String,
    pub port: u16,
    #[serde(rename = "clientId")]
    pub client_id: i32,
    pub connected: bool,
}

/// Shared handle to the one broker session.
pub struct SessionProxy {
    host: String,
    port: u16,
    client_id: i32,
    connector: Box<dyn BrokerConnector>,
    client: Mutex<Option<Box<dyn BrokerClient>>>,
    connected: AtomicBool,
}

impl SessionProxy {
    pub fn new(
        connector: Box<dyn BrokerConnector>,
        host: impl Into<String>,
        port: u16,
        client_id: i32,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            client_id,
            connector,
            client: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Whether the session currently holds a live connection.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id,
            connected: self.connected(),
        }
    }

    /// Establish the gateway connection. Idempotent: calling while already
    /// connected is a no-op.
    pub async fn connect(&self) -> Result<()> {
        let mut guard = self.client.lock().await;
        if guard.is_some() {
            debug!("connect() on an already-connected session, ignoring");
            return Ok(());
        }

        let client = self
            .connector
            .connect(&self.host, self.port, self.client_id)
            .await?;
        *guard = Some(client);
        self.connected.store(true, Ordering::Release);
        info!(
            "Broker session connected ({}:{}, client id {})",
            self.host, self.port, self.client_id
        );
        Ok(())
    }

    /// How long disconnect waits for in-flight broker traffic to settle.
    const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

    /// Drop the gateway connection. Safe to call when never connected.
    /// Bounded: an operation wedged against an unresponsive gateway must
    /// not stall shutdown, so after the grace period the connection is
    /// abandoned instead of closed.
    pub async fn disconnect(&self) -> Result<()> {
        let mut guard =
            match tokio::time::timeout(Self::DISCONNECT_GRACE, self.client.lock()).await {
                Ok(guard) => guard,
                Err(_) => {
                    warn!("In-flight broker traffic did not settle, abandoning connection");
                    self.connected.store(false, Ordering::Release);
                    return Ok(());
                }
            };
        if let Some(mut client) = guard.take() {
            client.close().await.ok();
            info!("Broker session disconnected");
        }
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    /// Issue one gateway operation. Requests are serialized FIFO by the
    /// internal lock. If the connection has dropped, exactly one reconnect
    /// is attempted before giving up with `SessionUnavailable`.
    pub async fn request(&self, op: &str, params: Value) -> Result<Value> {
        let mut guard = self.client.lock().await;

        if guard.is_none() {
            *guard = Some(self.reconnect().await?);
        }

        let client = guard.as_mut().ok_or_else(|| {
            BrokerError::SessionUnavailable("no gateway connection".to_string())
        })?;

        match client.request(op, params.clone()).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_disconnect() => {
                warn!("Gateway connection lost mid-request: {}", e);
                self.connected.store(false, Ordering::Release);
                *guard = None;

                let mut fresh = self.reconnect().await?;
                let value = fresh.request(op, params).await.map_err(|e| {
                    BrokerError::SessionUnavailable(e.to_string())
                })?;
                *guard = Some(fresh);
                self.connected.store(true, Ordering::Release);
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    async fn reconnect(&self) -> Result<Box<dyn BrokerClient>> {
        match self
            .connector
            .connect(&self.host, self.port, self.client_id)
            .await
        {
            Ok(client) => {
                self.connected.store(true, Ordering::Release);
                Ok(client)
            }
            Err(e) => {
                self.connected.store(false, Ordering::Release);
                warn!("Broker session unavailable: {}", e);
                Err(BrokerError::SessionUnavailable(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    struct MockClient {
        fail_next: Arc<AtomicBool>,
        in_flight: Arc<AtomicUsize>,
        overlap_seen: Arc<AtomicBool>,
        delay_ms: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrokerClient for MockClient {
        async fn request(&mut self, op: &str, _params: Value) -> Result<Value> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(BrokerError::ConnectionDropped);
            }
            let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst);
            if concurrent > 0 {
                self.overlap_seen.store(true, Ordering::SeqCst);
            }
            let delay = self.delay_ms.load(Ordering::SeqCst) as u64;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(serde_json::json!({ "op": op }))
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct MockConnector {
        connects: Arc<AtomicUsize>,
        refuse: Arc<AtomicBool>,
        fail_next: Arc<AtomicBool>,
        in_flight: Arc<AtomicUsize>,
        overlap_seen: Arc<AtomicBool>,
        delay_ms: Arc<AtomicUsize>,
    }

    impl MockConnector {
        fn new() -> Self {
            Self {
                connects: Arc::new(AtomicUsize::new(0)),
                refuse: Arc::new(AtomicBool::new(false)),
                fail_next: Arc::new(AtomicBool::new(false)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                overlap_seen: Arc::new(AtomicBool::new(false)),
                delay_ms: Arc::new(AtomicUsize::new(5)),
            }
        }
    }

    #[async_trait]
    impl BrokerConnector for MockConnector {
        async fn connect(
            &self,
            _host: &str,
            _port: u16,
            _client_id: i32,
        ) -> Result<Box<dyn BrokerClient>> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(BrokerError::ConnectFailed("refused".to_string()));
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockClient {
                fail_next: self.fail_next.clone(),
                in_flight: self.in_flight.clone(),
                overlap_seen: self.overlap_seen.clone(),
                delay_ms: self.delay_ms.clone(),
            }))
        }
    }

    fn proxy(connector: MockConnector) -> SessionProxy {
        SessionProxy::new(Box::new(connector), "127.0.0.1", 7497, 1)
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let connector = MockConnector::new();
        let connects = connector.connects.clone();
        let session = proxy(connector);

        session.connect().await.unwrap();
        assert!(session.connected());

        session.connect().await.unwrap();
        assert!(session.connected());
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_safe() {
        let session = proxy(MockConnector::new());
        session.disconnect().await.unwrap();
        assert!(!session.connected());
    }

    #[tokio::test]
    async fn request_reconnects_once_after_drop() {
        let connector = MockConnector::new();
        let connects = connector.connects.clone();
        let fail_next = connector.fail_next.clone();
        let session = proxy(connector);

        session.connect().await.unwrap();
        fail_next.store(true, Ordering::SeqCst);

        let value = session
            .request("positions", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(value["op"], "positions");
        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert!(session.connected());
    }

    #[tokio::test]
    async fn failed_reconnect_is_session_unavailable() {
        let connector = MockConnector::new();
        let refuse = connector.refuse.clone();
        let session = proxy(connector);

        refuse.store(true, Ordering::SeqCst);
        let err = session
            .request("positions", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::SessionUnavailable(_)));
        assert!(!session.connected());
    }

    #[tokio::test]
    async fn disconnect_is_bounded_when_an_operation_is_wedged() {
        let connector = MockConnector::new();
        connector.delay_ms.store(60_000, Ordering::SeqCst);
        let session = Arc::new(proxy(connector));
        session.connect().await.unwrap();

        let wedged = session.clone();
        tokio::spawn(async move {
            wedged.request("quote", serde_json::json!({})).await.ok();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        session.disconnect().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!session.connected());
    }

    #[tokio::test]
    async fn concurrent_requests_are_serialized() {
        let connector = MockConnector::new();
        let overlap_seen = connector.overlap_seen.clone();
        let session = Arc::new(proxy(connector));
        session.connect().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session.request("quote", serde_json::json!({})).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(!overlap_seen.load(Ordering::SeqCst));
    }
}
