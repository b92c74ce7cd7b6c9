use std::{sync::Arc, time::Duration};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod transport;

use mcp::{dispatcher::Dispatcher, registry::ToolRegistry, session::SessionStore};
use transport::unary::UnaryAdapter;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub unary: UnaryAdapter,
    pub ping_interval: Duration,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(registry: ToolRegistry, ping_interval: Duration, shutdown: CancellationToken) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry)));
        let unary = UnaryAdapter::new(Arc::clone(&dispatcher), SessionStore::new());

        Self {
            dispatcher,
            unary,
            ping_interval,
            shutdown,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    use http::handlers;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/.well-known/mcp", get(handlers::discovery))
        .route("/tools", get(handlers::list_tools))
        .route("/tasks/{category}", get(handlers::tasks_by_category))
        .route(
            "/mcp",
            post(handlers::mcp_endpoint)
                .delete(handlers::close_session)
                .options(handlers::cors_preflight),
        )
        .route(
            "/mcp/sse",
            get(handlers::mcp_push)
                .post(handlers::mcp_endpoint)
                .options(handlers::cors_preflight),
        )
        .route("/mcp/ws", get(handlers::mcp_websocket))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, Response, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::{config::Config, domain::build_registry, transport::unary::SESSION_HEADER};

    use super::*;

    fn app() -> Router {
        let registry = build_registry(&Config::default()).expect("catalog builds");
        build_app(AppState::new(
            registry,
            Duration::from_secs(30),
            CancellationToken::new(),
        ))
    }

    fn post_mcp(body: &str, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .uri("/mcp")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(id) = session {
            builder = builder.header(SESSION_HEADER, id);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request build")
    }

    async fn json_body(response: Response<Body>) -> serde_json::Value {
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&body).expect("valid json response")
    }

    async fn fetch(app: Router, uri: &str) -> Response<Body> {
        app.oneshot(
            Request::builder()
                .uri(uri)
                .method("GET")
                .body(Body::empty())
                .expect("request build"),
        )
        .await
        .expect("request execution")
    }

    const INITIALIZE: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"test-client","version":"1.0.0"},"capabilities":{}}}"#;

    #[tokio::test]
    async fn health_reports_healthy() {
        let response = fetch(app(), "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = json_body(response).await;
        assert_eq!(body_json["status"], "healthy");
        assert!(body_json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn root_lists_registered_tools() {
        let body_json = json_body(fetch(app(), "/").await).await;

        assert_eq!(body_json["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(body_json["mcp_endpoints"]["websocket"], "/mcp/ws");
        assert_eq!(body_json["available_tools"][0]["name"], "get_tasklist");
        assert_eq!(
            body_json["available_tools"].as_array().map(Vec::len),
            Some(4)
        );
    }

    #[tokio::test]
    async fn discovery_names_all_transports() {
        let response = fetch(app(), "/.well-known/mcp").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = json_body(response).await;
        assert_eq!(body_json["mcp_endpoint"], "/mcp");
        assert_eq!(body_json["sse_endpoint"], "/mcp/sse");
        assert_eq!(body_json["websocket_endpoint"], "/mcp/ws");
    }

    #[tokio::test]
    async fn tools_route_matches_protocol_listing() {
        let app = app();
        let rest = json_body(fetch(app.clone(), "/tools").await).await;

        let init = app
            .clone()
            .oneshot(post_mcp(INITIALIZE, None))
            .await
            .expect("request execution");
        let session = init
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .expect("session header");

        let listed = json_body(
            app.oneshot(post_mcp(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
                Some(&session),
            ))
            .await
            .expect("request execution"),
        )
        .await;

        assert_eq!(rest, listed["result"]);
    }

    #[tokio::test]
    async fn tasks_route_filters_by_category() {
        let response = fetch(app(), "/tasks/Work").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = json_body(response).await;
        assert_eq!(body_json["category"], "work");
        assert!(body_json["total_tasks"].as_u64().is_some_and(|n| n > 0));
        assert!(body_json["tasks"]
            .as_array()
            .expect("tasks array")
            .iter()
            .all(|task| task["category"] == "work"));
    }

    #[tokio::test]
    async fn tasks_route_rejects_unknown_category() {
        let response = fetch(app(), "/tasks/garden").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body_json = json_body(response).await;
        assert_eq!(body_json["code"], "invalid_category");
        assert!(body_json["message"]
            .as_str()
            .is_some_and(|message| message.contains("garden")));
    }

    #[tokio::test]
    async fn mcp_parse_error_has_null_id() {
        let response = app()
            .oneshot(post_mcp("{", None))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = json_body(response).await;
        assert_eq!(body_json["jsonrpc"], "2.0");
        assert!(body_json["id"].is_null());
        assert_eq!(body_json["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn mcp_empty_body_is_bad_request() {
        let response = app()
            .oneshot(post_mcp("", None))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mcp_notification_is_accepted_without_body() {
        let response = app()
            .oneshot(post_mcp(
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                None,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn mcp_initialize_opens_session_for_tool_calls() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_mcp(INITIALIZE, None))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .expect("session header");
        let body_json = json_body(response).await;
        assert_eq!(body_json["id"], 1);
        assert_eq!(body_json["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(
            body_json["result"]["serverInfo"]["name"],
            env!("CARGO_PKG_NAME")
        );
        assert_eq!(body_json["result"]["capabilities"]["tools"]["listChanged"], true);

        let call = json_body(
            app.oneshot(post_mcp(
                r#"{"jsonrpc":"2.0","id":"c-1","method":"tools/call","params":{"name":"test_slack","arguments":{}}}"#,
                Some(&session),
            ))
            .await
            .expect("request execution"),
        )
        .await;
        assert_eq!(call["id"], "c-1");
        assert_eq!(call["result"]["content"][0]["text"], "bingo!");
    }

    #[tokio::test]
    async fn mcp_tools_list_without_session_is_not_initialized() {
        let response = app()
            .oneshot(post_mcp(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
                None,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SESSION_HEADER).is_none());
        let body_json = json_body(response).await;
        assert_eq!(body_json["id"], 2);
        assert_eq!(body_json["error"]["code"], -32002);
    }

    #[tokio::test]
    async fn mcp_unknown_method_returns_method_not_found() {
        let body_json = json_body(
            app()
                .oneshot(post_mcp(
                    r#"{"jsonrpc":"2.0","id":9,"method":"resources/list"}"#,
                    None,
                ))
                .await
                .expect("request execution"),
        )
        .await;

        assert_eq!(body_json["id"], 9);
        assert_eq!(body_json["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn delete_closes_session() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_mcp(INITIALIZE, None))
            .await
            .expect("request execution");
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .expect("session header");

        let delete = |id: String| {
            Request::builder()
                .uri("/mcp")
                .method("DELETE")
                .header(SESSION_HEADER, id)
                .body(Body::empty())
                .expect("request build")
        };

        let first = app
            .clone()
            .oneshot(delete(session.clone()))
            .await
            .expect("request execution");
        assert_eq!(first.status(), StatusCode::NO_CONTENT);

        let second = app
            .clone()
            .oneshot(delete(session.clone()))
            .await
            .expect("request execution");
        assert_eq!(second.status(), StatusCode::NOT_FOUND);

        let gated = json_body(
            app.oneshot(post_mcp(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#,
                Some(&session),
            ))
            .await
            .expect("request execution"),
        )
        .await;
        assert_eq!(gated["error"]["code"], -32002);
    }

    #[tokio::test]
    async fn preflight_allows_session_header() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/mcp/sse")
                    .method("OPTIONS")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert!(response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .expect("ascii header")
            .contains("Mcp-Session-Id"));
    }

    #[tokio::test]
    async fn push_stream_opens_with_handshake_and_catalog() {
        let response = fetch(app(), "/mcp/sse").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .expect("ascii header")
            .starts_with("text/event-stream"));
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let mut body = response.into_body();
        let mut received = String::new();
        while received.matches("\n\n").count() < 2 {
            let frame = body
                .frame()
                .await
                .expect("stream stays open")
                .expect("frame reads");
            if let Some(data) = frame.data_ref() {
                received.push_str(&String::from_utf8_lossy(data));
            }
        }

        let events = received
            .split("\n\n")
            .filter_map(|event| event.strip_prefix("data: "))
            .map(|data| serde_json::from_str::<serde_json::Value>(data).expect("json event"))
            .collect::<Vec<_>>();
        assert_eq!(events[0]["method"], "notifications/initialized");
        assert_eq!(events[0]["params"]["serverInfo"]["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(events[1]["method"], "notifications/tools_changed");
        assert_eq!(events[1]["params"]["tools"][0]["name"], "get_tasklist");
    }

    #[tokio::test]
    async fn websocket_route_requires_upgrade() {
        let response = fetch(app(), "/mcp/ws").await;

        assert!(response.status().is_client_error());
    }
}
