//! stdio transport
//!
//! One newline-delimited JSON message per invocation, processed strictly in
//! arrival order by a single read-dispatch-write loop. Logging goes to
//! stderr, so stdout carries nothing but protocol frames.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::protocol::{McpError, McpMessage, RequestHandler};

/// stdio transport for the MCP line protocol
pub struct StdioTransport {
    handler: Arc<RequestHandler>,
}

impl StdioTransport {
    pub fn new(handler: Arc<RequestHandler>) -> Self {
        Self { handler }
    }

    /// Run the read-dispatch-write loop until EOF or ctrl-c.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Serving MCP on stdio");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        // One signal listener for the whole loop. A SIGINT that arrives
        // while an invocation is being handled stays pending and is
        // observed on the next trip through the select.
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            line.clear();

            let bytes_read = tokio::select! {
                result = reader.read_line(&mut line) => result?,
                _ = &mut ctrl_c => {
                    info!("Shutdown signal received, leaving stdio loop");
                    break;
                }
            };
            if bytes_read == 0 {
                info!("EOF on stdin, shutting down");
                break;
            }

            let frame = line.trim();
            if frame.is_empty() {
                continue;
            }

            debug!("Received: {}", frame);

            let message: McpMessage = match serde_json::from_str(frame) {
                Ok(message) => message,
                Err(e) => {
                    error!("Failed to parse message: {}", e);
                    let response = McpMessage::error_response(None, McpError::parse_error());
                    write_frame(&mut stdout, &response).await?;
                    continue;
                }
            };

            // Strict arrival order: the next frame is not read until this
            // invocation has been answered.
            let outcome = self.handler.handle(message).await;
            if let Some(response) = outcome.response {
                write_frame(&mut stdout, &response).await?;
            }
        }

        Ok(())
    }
}

async fn write_frame(
    stdout: &mut tokio::io::Stdout,
    response: &McpMessage,
) -> anyhow::Result<()> {
    let encoded = serde_json::to_string(response)?;
    debug!("Sending: {}", encoded);
    stdout.write_all(encoded.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
