//! MCP protocol types and handling

mod types;
mod handler;
mod capabilities;

pub use types::*;
pub use handler::{HandlerOutcome, RequestHandler};
pub use capabilities::ServerCapabilities;
