//! HTTP transport
//!
//! JSON-RPC over `POST /mcp`, plain health endpoints at `GET /` and
//! `GET /health`, and an SSE ready event at `GET /mcp/sse`. Concurrent
//! requests are not serialized here; the dispatch engine and session proxy
//! own concurrency safety. The HTTP status reflects the invocation outcome
//! so plain HTTP callers do not have to parse the body to spot failures.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::dispatch::ErrorKind;
use crate::protocol::{McpMessage, RequestHandler};

/// HTTP transport for the MCP protocol
pub struct HttpTransport {
    handler: Arc<RequestHandler>,
    host: String,
    port: u16,
}

impl HttpTransport {
    pub fn new(handler: Arc<RequestHandler>, host: impl Into<String>, port: u16) -> Self {
        Self {
            handler,
            host: host.into(),
            port,
        }
    }

    fn router(handler: Arc<RequestHandler>) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(health))
            .route("/health", get(health))
            .route("/mcp", post(handle_mcp_request))
            .route("/mcp/sse", get(handle_mcp_sse))
            .layer(cors)
            .with_state(handler)
    }

    /// Bind and serve until ctrl-c; accepted requests are drained before
    /// this returns.
    pub async fn run(&self) -> anyhow::Result<()> {
        let app = Self::router(self.handler.clone());

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Serving MCP over HTTP on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("Shutdown signal received, draining HTTP connections");
}

/// Health check endpoint
async fn health() -> &'static str {
    "OK"
}

/// Map an invocation failure to the HTTP status of the response.
pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::UnknownTool => StatusCode::NOT_FOUND,
        ErrorKind::InvalidArguments => StatusCode::BAD_REQUEST,
        ErrorKind::SessionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::HandlerExecution => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handle an MCP JSON-RPC request via HTTP POST
async fn handle_mcp_request(
    State(handler): State<Arc<RequestHandler>>,
    Json(message): Json<McpMessage>,
) -> axum::response::Response {
    debug!("HTTP request: {:?}", message.method);

    let outcome = handler.handle(message).await;
    let status = outcome
        .failure
        .map(status_for)
        .unwrap_or(StatusCode::OK);

    match outcome.response {
        Some(response) => (status, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Handle MCP via Server-Sent Events
async fn handle_mcp_sse(
    State(_handler): State<Arc<RequestHandler>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("SSE connection established");

    let stream = async_stream::stream! {
        yield Ok(Event::default().data(r#"{"status":"ready"}"#));
    };

    Sse::new(stream)
}
