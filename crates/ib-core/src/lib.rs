//! # ib-core
//!
//! Broker-facing plumbing for the ib-mcp server: the error taxonomy, the
//! opaque gateway client seam, and the shared session proxy that linearizes
//! all broker traffic.

mod client;
mod error;
mod session;

pub use client::{BrokerClient, BrokerConnector, TcpBrokerClient, TcpConnector};
pub use error::{BrokerError, Result};
pub use session::{SessionInfo, SessionProxy};
