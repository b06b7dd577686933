//! Dispatch engine
//!
//! One invocation pipeline shared by both transports: resolve the tool,
//! validate arguments, execute the handler against the shared session under
//! a timeout, and classify any fault. A handler fault never propagates past
//! this boundary; every caller gets a well-formed `InvocationResult`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use ib_core::{BrokerError, SessionProxy};

use crate::config::Transport;
use crate::protocol::ToolCallResult;
use crate::tools::{validate_arguments, ToolRegistry};

/// One inbound tool invocation, already decoded from the wire.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub tool_name: String,
    pub arguments: Value,
    pub origin: Transport,
}

/// Per-call failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownTool,
    InvalidArguments,
    SessionUnavailable,
    HandlerExecution,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnknownTool => "UnknownToolError",
            ErrorKind::InvalidArguments => "InvalidArgumentsError",
            ErrorKind::SessionUnavailable => "SessionUnavailableError",
            ErrorKind::HandlerExecution => "HandlerExecutionError",
        }
    }
}

/// Outcome of one invocation: exactly Success or Failure.
#[derive(Debug, Clone)]
pub enum InvocationResult {
    Success(Value),
    Failure { kind: ErrorKind, message: String },
}

impl InvocationResult {
    fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Encode into the MCP content + isError result shape. Identical for
    /// both transports by construction.
    pub fn into_tool_result(self) -> ToolCallResult {
        match self {
            Self::Success(payload) => ToolCallResult::json(&payload),
            Self::Failure { kind, message } => {
                ToolCallResult::error(format!("{}: {}", kind.as_str(), message))
            }
        }
    }
}

/// Validates, routes and executes tool invocations.
pub struct DispatchEngine {
    registry: Arc<ToolRegistry>,
    session: Arc<SessionProxy>,
    call_timeout: Duration,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<ToolRegistry>,
        session: Arc<SessionProxy>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            session,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        let Some(definition) = self.registry.resolve(&request.tool_name) else {
            debug!("Unknown tool requested: {}", request.tool_name);
            return InvocationResult::failure(
                ErrorKind::UnknownTool,
                format!("tool '{}' not found", request.tool_name),
            );
        };

        if let Err(detail) = validate_arguments(&definition.tool.input_schema, &request.arguments)
        {
            debug!("Rejected arguments for {}: {}", request.tool_name, detail);
            return InvocationResult::failure(ErrorKind::InvalidArguments, detail);
        }

        let future = (definition.handler)(request.arguments, self.session.clone());
        // The handler runs on a detached task: a timeout or a dropped
        // transport connection abandons the result, never the in-flight
        // broker operation, so the session is not left half-issued.
        let mut task = tokio::spawn(AssertUnwindSafe(future).catch_unwind());

        match tokio::time::timeout(self.call_timeout, &mut task).await {
            Err(_) => {
                warn!(
                    "Tool {} exceeded the {:?} call timeout",
                    request.tool_name, self.call_timeout
                );
                InvocationResult::failure(
                    ErrorKind::SessionUnavailable,
                    format!(
                        "tool '{}' timed out after {}s",
                        request.tool_name,
                        self.call_timeout.as_secs()
                    ),
                )
            }
            Ok(Err(join_error)) => {
                warn!("Tool {} task failed: {}", request.tool_name, join_error);
                InvocationResult::failure(ErrorKind::HandlerExecution, join_error.to_string())
            }
            Ok(Ok(Err(panic))) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                warn!("Tool {} panicked: {}", request.tool_name, message);
                InvocationResult::failure(ErrorKind::HandlerExecution, message)
            }
            Ok(Ok(Ok(Ok(payload)))) => InvocationResult::Success(payload),
            Ok(Ok(Ok(Err(error)))) => classify(&request.tool_name, error),
        }
    }
}

fn classify(tool_name: &str, error: anyhow::Error) -> InvocationResult {
    match error.downcast_ref::<BrokerError>() {
        Some(BrokerError::SessionUnavailable(_)) => {
            warn!("Session unavailable during {}: {}", tool_name, error);
            InvocationResult::failure(ErrorKind::SessionUnavailable, error.to_string())
        }
        _ => {
            warn!("Tool {} failed: {}", tool_name, error);
            InvocationResult::failure(ErrorKind::HandlerExecution, error.to_string())
        }
    }
}
