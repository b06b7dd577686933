//! Server configuration
//!
//! Resolution order is CLI flag, then environment variable, then built-in
//! default, which is exactly what clap's `env` attribute gives us.

use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Transport selection. Chosen once at startup; a server instance runs
/// exactly one transport for its lifetime.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Line-delimited JSON over stdin/stdout (for MCP clients like Claude Desktop)
    #[default]
    Stdio,
    /// JSON-RPC over HTTP
    Http,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Transport::Stdio => "stdio",
            Transport::Http => "http",
        })
    }
}

/// ib-mcp-server - Interactive Brokers gateway bridge over MCP
#[derive(Parser, Debug, Clone)]
#[command(name = "ib-mcp-server")]
#[command(version)]
#[command(about = "MCP server bridging tool calls to an Interactive Brokers gateway session")]
pub struct ServerConfig {
    /// Transport to serve: {stdio,http}
    #[arg(long, value_enum, default_value_t = Transport::Stdio, env = "IB_MCP_TRANSPORT")]
    pub transport: Transport,

    /// Gateway host
    #[arg(long, default_value = "127.0.0.1", env = "IB_MCP_HOST")]
    pub host: String,

    /// Gateway port
    #[arg(long, default_value_t = 7497, env = "IB_MCP_PORT",
          value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Gateway client id
    #[arg(long, default_value_t = 1, env = "IB_MCP_CLIENT_ID")]
    pub client_id: i32,

    /// Bind host for the HTTP transport
    #[arg(long, default_value = "127.0.0.1", env = "IB_MCP_HTTP_HOST")]
    pub http_host: String,

    /// Bind port for the HTTP transport
    #[arg(long, default_value_t = 8000, env = "IB_MCP_HTTP_PORT",
          value_parser = clap::value_parser!(u16).range(1..))]
    pub http_port: u16,

    /// Per-invocation timeout in seconds
    #[arg(long, default_value_t = 30, env = "IB_MCP_CALL_TIMEOUT")]
    pub call_timeout: u64,
}

impl ServerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout)
    }
}
