//! HTTP server implementation using Axum.

use crate::handler::{handle_health, handle_rpc};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use palette_core::{BufferedSink, PluginEvent, RpcConfig, Session};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// The discovery session driven by UI messages
    pub session: Arc<Session>,
    /// Events emitted by the session, drained into RPC results
    pub sink: Arc<BufferedSink>,
    /// Set to `true` when the UI cancels the session
    pub shutdown: watch::Sender<bool>,
    /// Events emitted outside any request, held for `poll_events`. Locked for
    /// the whole of a dispatch so requests never drain each other's events.
    pub backlog: Mutex<Vec<PluginEvent>>,
}

impl AppState {
    pub fn new(session: Arc<Session>, sink: Arc<BufferedSink>, shutdown: watch::Sender<bool>) -> Self {
        Self {
            session,
            sink,
            shutdown,
            backlog: Mutex::new(Vec::new()),
        }
    }
}

/// Build the router serving `/health` and `/rpc`.
pub fn router(state: Arc<AppState>) -> Router {
    // Configure CORS for the plugin iframe
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(DefaultBodyLimit::max(RpcConfig::MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0)
/// and the server task, which finishes once a cancel has been answered.
pub async fn start_server(
    state: AppState,
    host: &str,
    port: u16,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let mut shutdown = state.shutdown.subscribe();
    let app = router(Arc::new(state));

    // Parse the address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    // Bind to the address
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    let server = tokio::spawn(async move {
        let cancelled = async move {
            let _ = shutdown.wait_for(|cancelled| *cancelled).await;
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(cancelled)
            .await
        {
            error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, server))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use palette_core::{DocumentFixture, MemoryHost, NodeFixture, NodeFixtureKind, PaletteConfig};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_state() -> AppState {
        let host = Arc::new(MemoryHost::new(DocumentFixture {
            pages: vec![NodeFixture::new("0:1", "Page 1", NodeFixtureKind::Page).with_children(vec![
                NodeFixture::new("1:1", "Button", NodeFixtureKind::Component),
            ])],
            ..Default::default()
        }));
        let sink = Arc::new(BufferedSink::new());
        let session = Session::new(PaletteConfig::default(), host.clone(), host, sink.clone()).unwrap();
        AppState::new(Arc::new(session), sink, watch::channel(false).0)
    }

    fn slow_state() -> Arc<AppState> {
        let host = Arc::new(
            MemoryHost::new(DocumentFixture {
                pages: vec![NodeFixture::new("0:1", "Page 1", NodeFixtureKind::Page)
                    .with_children(vec![NodeFixture::new("1:1", "Button", NodeFixtureKind::Component)])],
                ..Default::default()
            })
            .with_load_delay(Duration::from_millis(20)),
        );
        let sink = Arc::new(BufferedSink::new());
        let session = Session::new(PaletteConfig::default(), host.clone(), host, sink.clone()).unwrap();
        Arc::new(AppState::new(Arc::new(session), sink, watch::channel(false).0))
    }

    fn event_types(response: &Value) -> Vec<String> {
        response["result"]["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["type"].as_str().unwrap().to_string())
            .collect()
    }

    fn state() -> Arc<AppState> {
        Arc::new(app_state())
    }

    async fn call(app: Router, body: Value) -> Value {
        let request = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_server_starts() {
        let (addr, server) = start_server(app_state(), "127.0.0.1", 0).await.unwrap();
        assert!(addr.port() > 0);
        server.abort();
    }

    #[tokio::test]
    async fn test_health_route() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = router(state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_refresh_returns_emitted_events() {
        let response = call(
            router(state()),
            json!({"jsonrpc": "2.0", "method": "refresh-components", "id": 7}),
        )
        .await;

        assert_eq!(response["id"], json!(7));
        let events = response["result"]["events"].as_array().unwrap();
        let page = events
            .iter()
            .find(|e| e["type"] == "components-page-loaded")
            .unwrap();
        assert_eq!(page["components"][0]["name"], "Button");
        assert_eq!(page["hasMore"], json!(false));
    }

    #[tokio::test]
    async fn test_cancel_signals_shutdown() {
        let state = state();
        let response = call(
            router(state.clone()),
            json!({"jsonrpc": "2.0", "method": "cancel", "id": 1}),
        )
        .await;
        assert_eq!(response["result"]["events"], json!([]));
        assert!(*state.shutdown.borrow());
    }

    #[tokio::test]
    async fn test_concurrent_calls_keep_their_own_events() {
        let state = slow_state();
        let (refresh, insert) = tokio::join!(
            call(
                router(state.clone()),
                json!({"jsonrpc": "2.0", "method": "refresh-components", "id": 1}),
            ),
            call(
                router(state.clone()),
                json!({"jsonrpc": "2.0", "method": "insert-component", "params": {"componentId": "1:1"}, "id": 2}),
            ),
        );

        let refresh_types = event_types(&refresh);
        assert!(refresh_types.iter().any(|t| t == "components-page-loaded"));
        assert!(refresh_types.iter().all(|t| t != "component-inserted"));
        assert_eq!(event_types(&insert), vec!["component-inserted"]);

        let polled = call(
            router(state),
            json!({"jsonrpc": "2.0", "method": "poll_events", "id": 3}),
        )
        .await;
        assert_eq!(polled["result"]["events"], json!([]));
    }

    #[tokio::test]
    async fn test_startup_events_are_held_for_poll_events() {
        let state = state();
        state.session.initialize().await;

        let insert = call(
            router(state.clone()),
            json!({"jsonrpc": "2.0", "method": "insert-component", "params": {"componentId": "1:1"}, "id": 1}),
        )
        .await;
        assert_eq!(event_types(&insert), vec!["component-inserted"]);

        let polled = call(
            router(state.clone()),
            json!({"jsonrpc": "2.0", "method": "poll_events", "id": 2}),
        )
        .await;
        let types = event_types(&polled);
        assert!(types.iter().any(|t| t == "loading-status"));
        assert!(types.iter().any(|t| t == "components-page-loaded"));

        let again = call(
            router(state),
            json!({"jsonrpc": "2.0", "method": "poll_events", "id": 3}),
        )
        .await;
        assert_eq!(again["result"]["events"], json!([]));
    }
}
