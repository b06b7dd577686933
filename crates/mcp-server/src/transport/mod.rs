//! Transport implementations for the MCP server

mod stdio;
mod http;

pub use stdio::StdioTransport;
pub use http::HttpTransport;
