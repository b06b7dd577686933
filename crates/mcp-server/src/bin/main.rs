//! ib-mcp-server binary
//!
//! Builds the tool registry, connects the broker session and serves the
//! configured transport. Startup failures (duplicate tool registration,
//! failed gateway connect) exit non-zero; graceful shutdown exits zero.

use clap::Parser;
use std::sync::Arc;

use ib_core::{SessionProxy, TcpConnector};
use ib_mcp_server::{tools, McpServer, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    // Logs go to stderr so stdio framing stays clean in stdio mode.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let session = Arc::new(SessionProxy::new(
        Box::new(TcpConnector),
        config.host.clone(),
        config.port,
        config.client_id,
    ));

    let mut server = McpServer::new(config, session);
    server.register_tools(tools::builtin_registry()?)?;
    server.run().await
}
