//! Gateway client seam
//!
//! The brokerage wire protocol is treated as opaque: everything above this
//! module sees only `connect` / `request` / `close`. The TCP implementation
//! below speaks a minimal newline-delimited JSON framing to the gateway and
//! stands in for a full protocol client.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{BrokerError, Result};

/// One live connection to the brokerage gateway.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Issue one request and wait for its response.
    async fn request(&mut self, op: &str, params: Value) -> Result<Value>;

    /// Close the connection. Must be safe to call once on shutdown.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for broker connections. The session proxy holds one of these and
/// calls it for the initial connect and for reconnect attempts.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        client_id: i32,
    ) -> Result<Box<dyn BrokerClient>>;
}

/// TCP client for the gateway's line-framed JSON API.
pub struct TcpBrokerClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    client_id: i32,
    seq: u64,
}

impl TcpBrokerClient {
    async fn open(host: &str, port: u16, client_id: i32) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| BrokerError::ConnectFailed(format!("{}:{}: {}", host, port, e)))?;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();

        debug!("Gateway connection established to {}:{}", host, port);

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            client_id,
            seq: 0,
        })
    }
}

#[async_trait]
impl BrokerClient for TcpBrokerClient {
    async fn request(&mut self, op: &str, params: Value) -> Result<Value> {
        self.seq += 1;
        let frame = serde_json::json!({
            "id": self.seq,
            "clientId": self.client_id,
            "op": op,
            "params": params,
        });

        let mut line = serde_json::to_string(&frame)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;

        // Replies are correlated by id: a late answer to an operation the
        // caller already gave up on is discarded, not returned as this
        // request's payload.
        loop {
            let mut response = String::new();
            let bytes_read = self.reader.read_line(&mut response).await?;
            if bytes_read == 0 {
                return Err(BrokerError::ConnectionDropped);
            }

            let reply: Value = serde_json::from_str(response.trim())
                .map_err(|e| BrokerError::MalformedResponse(e.to_string()))?;

            match reply.get("id").and_then(Value::as_u64) {
                Some(id) if id == self.seq => {
                    if let Some(message) = reply.get("error").and_then(Value::as_str) {
                        return Err(BrokerError::Rejected(message.to_string()));
                    }
                    return Ok(reply.get("result").cloned().unwrap_or(Value::Null));
                }
                Some(id) if id < self.seq => {
                    debug!("Discarding stale gateway reply {}", id);
                }
                _ => {
                    return Err(BrokerError::MalformedResponse(format!(
                        "reply without a matching id: {}",
                        response.trim()
                    )))
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await.ok();
        Ok(())
    }
}

/// Connector producing [`TcpBrokerClient`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl BrokerConnector for TcpConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        client_id: i32,
    ) -> Result<Box<dyn BrokerClient>> {
        let client = TcpBrokerClient::open(host, port, client_id).await?;
        Ok(Box::new(client))
    }
}
