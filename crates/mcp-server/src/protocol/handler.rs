//! MCP request handler
//!
//! One handler instance serves whichever transport was selected at startup.
//! It is shared by `Arc` and deliberately takes `&self`: the HTTP adapter
//! must not serialize concurrent requests, so the only per-session state
//! (the initialized flag) is an atomic.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::capabilities::ServerCapabilities;
use super::types::*;
use crate::config::Transport;
use crate::dispatch::{DispatchEngine, ErrorKind, InvocationRequest};

/// Result of handling one message: the response to write back (if any) and
/// the invocation failure kind, which the HTTP adapter maps to a status code.
pub struct HandlerOutcome {
    pub response: Option<McpMessage>,
    pub failure: Option<ErrorKind>,
}

impl HandlerOutcome {
    fn reply(response: McpMessage) -> Self {
        Self {
            response: Some(response),
            failure: None,
        }
    }

    fn silent() -> Self {
        Self {
            response: None,
            failure: None,
        }
    }
}

/// Handler for MCP requests
pub struct RequestHandler {
    engine: Arc<DispatchEngine>,
    origin: Transport,
    server_name: String,
    server_version: String,
    initialized: AtomicBool,
}

impl RequestHandler {
    pub fn new(engine: Arc<DispatchEngine>, origin: Transport) -> Self {
        Self {
            engine,
            origin,
            server_name: "ib-mcp-server".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Handle an incoming message
    pub async fn handle(&self, message: McpMessage) -> HandlerOutcome {
        if message.is_request() {
            let method = message.method.as_deref().unwrap_or_default();
            let id = message.id.clone().unwrap_or(Value::Null);

            debug!("Handling request: {}", method);

            if method == "tools/call" {
                return self.handle_tools_call(id, message.params).await;
            }

            let result = match method {
                "initialize" => self.handle_initialize(message.params),
                "ping" => Ok(serde_json::json!({})),
                "tools/list" => self.handle_tools_list(),
                _ => Err(McpError::method_not_found()),
            };

            HandlerOutcome::reply(match result {
                Ok(result) => McpMessage::response(id, result),
                Err(error) => McpMessage::error_response(Some(id), error),
            })
        } else if message.is_notification() {
            let method = message.method.as_deref().unwrap_or_default();

            match method {
                "notifications/initialized" | "initialized" => {
                    info!("Client initialized");
                }
                "notifications/cancelled" => {
                    // The in-flight handler still runs to completion against
                    // the shared session; only its result is discarded.
                    debug!("Request cancelled by client");
                }
                _ => {
                    debug!("Unknown notification: {}", method);
                }
            }

            HandlerOutcome::silent()
        } else {
            debug!("Received unexpected response message");
            HandlerOutcome::silent()
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::invalid_params(e.to_string()))?
            .ok_or_else(|| McpError::invalid_params("Missing params"))?;

        info!(
            "Initializing session with client: {} v{}",
            params.client_info.name, params.client_info.version
        );

        self.initialized.store(true, Ordering::Release);

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities::with_tools(),
            server_info: ServerInfo {
                name: self.server_name.clone(),
                version: self.server_version.clone(),
            },
        };

        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<Value, McpError> {
        let result = ToolsListResult {
            tools: self.engine.registry().list(),
        };
        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }

    async fn handle_tools_call(&self, id: Value, params: Option<Value>) -> HandlerOutcome {
        let params: ToolCallParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return HandlerOutcome {
                    response: Some(McpMessage::error_response(
                        Some(id),
                        McpError::invalid_params("Missing params"),
                    )),
                    failure: Some(ErrorKind::InvalidArguments),
                }
            }
            Err(e) => {
                return HandlerOutcome {
                    response: Some(McpMessage::error_response(
                        Some(id),
                        McpError::invalid_params(e.to_string()),
                    )),
                    failure: Some(ErrorKind::InvalidArguments),
                }
            }
        };

        debug!("Calling tool: {}", params.name);

        let invocation = InvocationRequest {
            tool_name: params.name,
            arguments: params.arguments.unwrap_or(Value::Null),
            origin: self.origin,
        };

        let result = self.engine.invoke(invocation).await;
        let failure = result.error_kind();

        // Tool failures travel as content with isError set, not as JSON-RPC
        // errors, so MCP clients can surface them to the model.
        let response = match serde_json::to_value(result.into_tool_result()) {
            Ok(value) => McpMessage::response(id, value),
            Err(e) => McpMessage::error_response(Some(id), McpError::internal_error(e.to_string())),
        };

        HandlerOutcome {
            response: Some(response),
            failure,
        }
    }
}
