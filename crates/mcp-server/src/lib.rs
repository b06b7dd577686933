//! # ib-mcp-server
//!
//! MCP (Model Context Protocol) server front-end for an Interactive Brokers
//! gateway session. Supports both stdio and HTTP transports over one shared
//! dispatch path.

pub mod config;
pub mod dispatch;
pub mod protocol;
mod server;
pub mod tools;
pub mod transport;

pub use config::{ServerConfig, Transport};
pub use dispatch::{DispatchEngine, ErrorKind, InvocationRequest, InvocationResult};
pub use protocol::{McpError, McpMessage, ServerCapabilities};
pub use server::{LifecycleState, McpServer, ServerError};
pub use tools::{RegistryBuilder, ToolRegistry};
pub use transport::{HttpTransport, StdioTransport};
