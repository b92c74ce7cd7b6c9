//! The central Model Context Protocol engine
//!
//! Resolves decoded envelopes to protocol operations, enforces the
//! initialize-first ordering on the caller's session, and renders results or
//! errors as response envelopes. Every transport funnels through here.

use std::sync::Arc;

use rust_mcp_sdk::schema::{
    CallToolResult, Implementation, InitializeResult, ServerCapabilities, ServerCapabilitiesTools,
};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::mcp::{
    registry::{ToolArguments, ToolRegistry},
    rpc::{self, ErrorCode, RequestEnvelope, RequestId, ResponseEnvelope, JSONRPC_VERSION},
    session::{Session, SessionState},
};

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method<'a> {
    Initialize,
    Ping,
    ToolsList,
    ToolsCall,
    Initialized,
    Unknown(&'a str),
}

impl<'a> Method<'a> {
    pub fn parse(method: &'a str) -> Self {
        match method {
            "initialize" => Self::Initialize,
            "ping" => Self::Ping,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            "notifications/initialized" => Self::Initialized,
            other => Self::Unknown(other),
        }
    }
}

struct Failure {
    code: ErrorCode,
    message: String,
}

impl Failure {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Payload of a successful `initialize`; also announced on push streams.
    pub fn handshake(&self) -> Value {
        let initialize_result = InitializeResult {
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                description: None,
                icons: vec![],
                website_url: None,
            },
            capabilities: ServerCapabilities {
                tools: (!self.registry.is_empty()).then_some(ServerCapabilitiesTools {
                    list_changed: Some(true),
                }),
                ..Default::default()
            },
            protocol_version: SUPPORTED_PROTOCOL_VERSION.to_string(),
            instructions: None,
            meta: None,
        };

        serde_json::to_value(initialize_result).unwrap_or_else(|err| {
            warn!(error = %err, "initialize result serialization failed");
            json!({
                "protocolVersion": SUPPORTED_PROTOCOL_VERSION,
                "capabilities": {},
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION")
                }
            })
        })
    }

    /// `{"tools": [...]}` in registration order, shared by `tools/list`, the
    /// REST listing and push catalog notifications.
    pub fn tool_listing(&self) -> Value {
        json!({ "tools": self.registry.list() })
    }

    /// Decodes raw bytes and dispatches them. Undecodable input answers with
    /// the uncorrelated parse error.
    pub async fn handle_raw(&self, session: &mut Session, raw: &[u8]) -> Option<ResponseEnvelope> {
        match rpc::decode(raw) {
            Ok(envelope) => self.dispatch(session, envelope).await,
            Err(parse_error) => Some(parse_error),
        }
    }

    /// Returns `None` exactly when the envelope is a notification.
    pub async fn dispatch(
        &self,
        session: &mut Session,
        envelope: RequestEnvelope,
    ) -> Option<ResponseEnvelope> {
        let RequestEnvelope {
            jsonrpc,
            id,
            method,
            params,
        } = envelope;

        let Some(id) = id else {
            self.handle_notification(session, &method);
            return None;
        };

        let audit_params = redact_audit_params(params.as_ref());
        let outcome = if jsonrpc.as_deref().is_some_and(|v| v != JSONRPC_VERSION) {
            Err(Failure::new(
                ErrorCode::InvalidRequest,
                "Invalid Request: jsonrpc must be \"2.0\"",
            ))
        } else {
            self.route(session, &method, params).await
        };

        info!(
            method = %method,
            params = %audit_params,
            outcome = if outcome.is_ok() { "success" } else { "failure" },
            "mcp action audited"
        );

        Some(respond(id, outcome))
    }

    async fn route(
        &self,
        session: &mut Session,
        method: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<Value, Failure> {
        match Method::parse(method) {
            Method::Initialize => Ok(self.initialize(session, params.as_ref())),
            Method::Ping => Ok(json!({})),
            Method::ToolsList => {
                require_ready(session)?;
                Ok(self.tool_listing())
            }
            Method::ToolsCall => {
                require_ready(session)?;
                self.call_tool(params).await
            }
            Method::Initialized => Err(Failure::new(
                ErrorCode::InvalidRequest,
                "Invalid Request: notifications/initialized must be sent as a notification",
            )),
            Method::Unknown(name) => Err(Failure::new(
                ErrorCode::MethodNotFound,
                format!("Method not found: {name}"),
            )),
        }
    }

    fn initialize(&self, session: &mut Session, params: Option<&Map<String, Value>>) -> Value {
        if let Some(offered) = params
            .and_then(|object| object.get("protocolVersion"))
            .and_then(Value::as_str)
            .filter(|version| *version != SUPPORTED_PROTOCOL_VERSION)
        {
            debug!(
                offered = offered,
                supported = SUPPORTED_PROTOCOL_VERSION,
                "client offered a different protocol version"
            );
        }

        let result = self.handshake();
        session.mark_initialized();
        result
    }

    async fn call_tool(&self, params: Option<Map<String, Value>>) -> Result<Value, Failure> {
        let params = params.unwrap_or_default();
        let name = params.get("name").and_then(Value::as_str).ok_or_else(|| {
            Failure::new(
                ErrorCode::InvalidParams,
                "Invalid params: tools/call requires params.name",
            )
        })?;
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => ToolArguments::new(),
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(_) => {
                return Err(Failure::new(
                    ErrorCode::InvalidParams,
                    "Invalid params: params.arguments must be an object",
                ))
            }
        };

        let content = self
            .registry
            .invoke(name, &arguments)
            .await
            .map_err(|err| {
                warn!(tool = %name, error = %err, "tool invocation failed");
                Failure::new(err.code(), err.to_string())
            })?;

        serde_json::to_value(CallToolResult {
            content,
            is_error: None,
            meta: None,
            structured_content: None,
        })
        .map_err(|err| Failure::new(ErrorCode::InternalError, err.to_string()))
    }

    fn handle_notification(&self, session: &Session, method: &str) {
        match (Method::parse(method), session.state()) {
            (Method::Initialized, SessionState::Ready) => {
                debug!("client completed initialization");
            }
            (Method::Initialized, state) => {
                warn!(state = ?state, "initialized notification outside an open handshake");
            }
            _ => debug!(method = %method, "ignoring notification"),
        }
    }
}

fn require_ready(session: &Session) -> Result<(), Failure> {
    if session.is_initialized() {
        Ok(())
    } else {
        Err(Failure::new(
            ErrorCode::NotInitialized,
            "Server not initialized: send initialize first",
        ))
    }
}

fn respond(id: RequestId, outcome: Result<Value, Failure>) -> ResponseEnvelope {
    match outcome {
        Ok(result) => ResponseEnvelope::result(Some(id), result),
        Err(failure) => ResponseEnvelope::error(Some(id), failure.code, failure.message),
    }
}

pub fn redact_audit_params(params: Option<&Map<String, Value>>) -> Value {
    params
        .map(|object| redact_audit_value(&Value::Object(object.clone())))
        .unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
