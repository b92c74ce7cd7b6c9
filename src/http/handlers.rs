//! Axum HTTP handlers for the web server
//!
//! Mounts the unary, push and duplex adapters and the read-only REST endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State, WebSocketUpgrade},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, CACHE_CONTROL,
        },
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::{SecondsFormat, Utc};
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;

use crate::domain::tasks;
use crate::errors::{AppError, ToolError};
use crate::http::websocket::WebSocketConnection;
use crate::mcp::registry::{first_text, ToolArguments};
use crate::transport::{
    duplex, push,
    unary::{UnaryReply, SESSION_HEADER},
};
use crate::AppState;

const DESCRIPTION: &str = "A simple MCP server with HTTP serving and task management";
const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub mcp_endpoint: &'static str,
    pub sse_endpoint: &'static str,
    pub websocket_endpoint: &'static str,
}

#[derive(Debug, Serialize)]
pub struct McpEndpoints {
    pub sse: &'static str,
    pub jsonrpc: &'static str,
    pub websocket: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ToolSummary {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServerInfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub available_endpoints: [&'static str; 7],
    pub mcp_endpoints: McpEndpoints,
    pub available_tools: Vec<ToolSummary>,
}

pub async fn root(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    let available_tools = state
        .dispatcher
        .registry()
        .list()
        .into_iter()
        .map(|tool| ToolSummary {
            name: tool.name,
            description: tool.description,
        })
        .collect();

    Json(ServerInfoResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        description: DESCRIPTION,
        available_endpoints: [
            "/",
            "/health",
            "/tools",
            "/tasks/{category}",
            "/mcp/sse",
            "/mcp",
            "/mcp/ws",
        ],
        mcp_endpoints: McpEndpoints {
            sse: "/mcp/sse",
            jsonrpc: "/mcp",
            websocket: "/mcp/ws",
        },
        available_tools,
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        mcp_endpoint: "/mcp",
        sse_endpoint: "/mcp/sse",
        websocket_endpoint: "/mcp/ws",
    })
}

pub async fn list_tools(State(state): State<AppState>) -> Json<Value> {
    Json(state.dispatcher.tool_listing())
}

pub async fn tasks_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Value>, AppError> {
    let mut arguments = ToolArguments::new();
    arguments.insert("category".to_string(), Value::String(category));

    let blocks = state
        .dispatcher
        .registry()
        .invoke(tasks::TOOL_NAME, &arguments)
        .await
        .map_err(|err| match err {
            ToolError::InvalidParams(message) => AppError::bad_request("invalid_category", message),
            other => AppError::internal(other.to_string()),
        })?;

    let text = first_text(&blocks)
        .ok_or_else(|| AppError::internal("get_tasklist returned no text content"))?;
    serde_json::from_str(&text)
        .map(Json)
        .map_err(|err| AppError::internal(format!("get_tasklist returned invalid json: {err}")))
}

pub async fn mcp_endpoint(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = state.unary.handle(session_id, &body).await;

    let mut response = match outcome.reply {
        UnaryReply::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
        UnaryReply::Accepted => StatusCode::ACCEPTED.into_response(),
        UnaryReply::Body(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
    };

    if let Some(value) = outcome
        .session_id
        .and_then(|id| HeaderValue::from_str(&id).ok())
    {
        response.headers_mut().insert(SESSION_HEADER, value);
    }

    response
}

pub async fn close_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::bad_request("missing_session", "Mcp-Session-Id header is required"))?;

    if state.unary.close(session_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("unknown_session", "unknown session"))
    }
}

pub async fn mcp_push(State(state): State<AppState>) -> impl IntoResponse {
    let stream = push::open(Arc::clone(&state.dispatcher), state.ping_interval)
        .take_until(state.shutdown.clone().cancelled_owned())
        .map(|notification| Event::default().json_data(notification));

    (
        [
            (CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Sse::new(stream),
    )
}

pub async fn mcp_websocket(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| async move {
        duplex::run(
            &state.dispatcher,
            WebSocketConnection::new(socket),
            state.shutdown.clone(),
        )
        .await;
    })
}

pub async fn cors_preflight() -> impl IntoResponse {
    [
        (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, DELETE, OPTIONS"),
        (
            ACCESS_CONTROL_ALLOW_HEADERS,
            "Content-Type, Authorization, Mcp-Session-Id",
        ),
        (ACCESS_CONTROL_MAX_AGE, "86400"),
    ]
}
