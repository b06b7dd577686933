//! Server lifecycle controller
//!
//! Drives `Created -> RegistryBuilt -> SessionConnecting -> Serving ->
//! Draining -> Stopped`. No transition skips a state; `Stopped` is terminal.
//! A failed broker connect at startup goes straight to `Stopped` and
//! surfaces a fatal error, so the server never serves with a dead session.

use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::info;

use ib_core::SessionProxy;

use crate::config::{ServerConfig, Transport};
use crate::dispatch::DispatchEngine;
use crate::protocol::RequestHandler;
use crate::tools::ToolRegistry;
use crate::transport::{HttpTransport, StdioTransport};

/// Lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    RegistryBuilt,
    SessionConnecting,
    Serving,
    Draining,
    Stopped,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid lifecycle transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("Broker connect failed: {0}")]
    ConnectFailed(#[from] ib_core::BrokerError),
}

/// MCP server: owns the lifecycle and the chosen transport.
pub struct McpServer {
    config: ServerConfig,
    session: Arc<SessionProxy>,
    registry: Option<Arc<ToolRegistry>>,
    state: Mutex<LifecycleState>,
}

impl McpServer {
    pub fn new(config: ServerConfig, session: Arc<SessionProxy>) -> Self {
        Self {
            config,
            session,
            registry: None,
            state: Mutex::new(LifecycleState::Created),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, to: LifecycleState) -> Result<(), ServerError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let allowed = matches!(
            (*state, to),
            (LifecycleState::Created, LifecycleState::RegistryBuilt)
                | (LifecycleState::RegistryBuilt, LifecycleState::SessionConnecting)
                | (LifecycleState::SessionConnecting, LifecycleState::Serving)
                | (LifecycleState::Serving, LifecycleState::Draining)
                | (LifecycleState::Draining, LifecycleState::Stopped)
        );
        if !allowed {
            return Err(ServerError::InvalidTransition { from: *state, to });
        }
        info!("Lifecycle: {:?} -> {:?}", *state, to);
        *state = to;
        Ok(())
    }

    /// Fatal startup failure: stop directly without passing through the
    /// serving states.
    fn stop_on_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        info!("Lifecycle: {:?} -> Stopped (startup failure)", *state);
        *state = LifecycleState::Stopped;
    }

    /// Install the tool registry. Must happen exactly once, before `run`.
    pub fn register_tools(&mut self, registry: ToolRegistry) -> Result<(), ServerError> {
        self.advance(LifecycleState::RegistryBuilt)?;
        info!("Registered {} tools", registry.len());
        self.registry = Some(Arc::new(registry));
        Ok(())
    }

    /// Connect the broker session, serve the configured transport until
    /// shutdown, then drain and disconnect.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.advance(LifecycleState::SessionConnecting)?;
        let registry = self
            .registry
            .clone()
            .ok_or_else(|| anyhow::anyhow!("run() called before register_tools()"))?;

        if let Err(e) = self.session.connect().await {
            self.stop_on_failure();
            return Err(ServerError::ConnectFailed(e).into());
        }

        let engine = Arc::new(DispatchEngine::new(
            registry,
            self.session.clone(),
            self.config.call_timeout(),
        ));
        let handler = Arc::new(RequestHandler::new(engine, self.config.transport));

        self.advance(LifecycleState::Serving)?;

        let served = match self.config.transport {
            Transport::Stdio => StdioTransport::new(handler).run().await,
            Transport::Http => {
                HttpTransport::new(handler, self.config.http_host.clone(), self.config.http_port)
                    .run()
                    .await
            }
        };

        // The transport has stopped accepting and drained in-flight calls by
        // the time run() returns.
        self.advance(LifecycleState::Draining)?;
        self.session.disconnect().await?;
        self.advance(LifecycleState::Stopped)?;

        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin_registry;
    use async_trait::async_trait;
    use clap::Parser;
    use ib_core::BrokerError;

    struct NeverConnector;

    #[async_trait]
    impl ib_core::BrokerConnector for NeverConnector {
        async fn connect(
            &self,
            _host: &str,
            _port: u16,
            _client_id: i32,
        ) -> ib_core::Result<Box<dyn ib_core::BrokerClient>> {
            Err(BrokerError::ConnectFailed("refused".to_string()))
        }
    }

    fn test_server() -> McpServer {
        let config = ServerConfig::parse_from(["ib-mcp-server"]);
        let session = Arc::new(SessionProxy::new(
            Box::new(NeverConnector),
            "127.0.0.1",
            7497,
            1,
        ));
        McpServer::new(config, session)
    }

    #[test]
    fn registration_advances_to_registry_built() {
        let mut server = test_server();
        assert_eq!(server.state(), LifecycleState::Created);

        server.register_tools(builtin_registry().unwrap()).unwrap();
        assert_eq!(server.state(), LifecycleState::RegistryBuilt);
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut server = test_server();
        server.register_tools(builtin_registry().unwrap()).unwrap();

        let err = server
            .register_tools(builtin_registry().unwrap())
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn run_without_registry_fails() {
        let server = test_server();
        assert!(server.run().await.is_err());
    }

    #[tokio::test]
    async fn failed_connect_stops_the_lifecycle() {
        let mut server = test_server();
        server.register_tools(builtin_registry().unwrap()).unwrap();

        let result = server.run().await;
        assert!(result.is_err());
        assert_eq!(server.state(), LifecycleState::Stopped);
    }
}
