//! JSON-RPC request handlers.
//!
//! Every UI message type is an RPC method of the same name whose params are
//! the message payload. The result carries the events the session emitted
//! while handling it. Calls are dispatched one at a time; events emitted
//! outside a call are returned by `poll_events`.

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use palette_core::{Disposition, PaletteError, UiMessage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    // Handle built-in methods
    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    match dispatch_method(&state, method, &params).await {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => {
            error!("RPC error for {}: {}", method, e);
            let code = e.to_rpc_error_code();
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(id, code, e.to_string())),
            )
        }
    }
}

// ============================================================================
// Helper macros for extracting parameters
// ============================================================================

/// Extract a string parameter, supporting both snake_case and camelCase.
macro_rules! get_str_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        $params
            .get($snake)
            .or_else(|| $params.get($camel))
            .and_then(|v| v.as_str())
    };
}

/// Extract a required string parameter or return an error.
macro_rules! require_str_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        match get_str_param!($params, $snake, $camel) {
            Some(s) => s.to_string(),
            None => {
                return Err(PaletteError::InvalidParams {
                    message: format!("Missing required parameter: {}", $camel),
                });
            }
        }
    };
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call to the session.
async fn dispatch_method(
    state: &AppState,
    method: &str,
    params: &Value,
) -> palette_core::Result<Value> {
    match method {
        "poll_events" => {
            let mut backlog = state.backlog.lock().await;
            backlog.extend(state.sink.drain());
            Ok(json!({ "events": std::mem::take(&mut *backlog) }))
        }

        "get_state" => Ok(json!({
            "state": state.session.state().await,
            "config": state.session.config(),
        })),

        _ => {
            let message = parse_message(method, params)?;

            // Serialize dispatch: whatever the sink holds before this request
            // runs was emitted outside any request and belongs to poll_events.
            let mut backlog = state.backlog.lock().await;
            backlog.extend(state.sink.drain());
            let disposition = state.session.handle(message).await;
            let events = state.sink.drain();
            drop(backlog);

            if disposition == Disposition::Terminate {
                info!("UI cancelled the session, shutting down");
                state.shutdown.send_replace(true);
            }
            Ok(json!({ "events": events }))
        }
    }
}

/// Build the UI message a method call stands for.
fn parse_message(method: &str, params: &Value) -> palette_core::Result<UiMessage> {
    let message = match method {
        "insert-component" => UiMessage::InsertComponent {
            component_id: require_str_param!(params, "component_id", "componentId"),
            library_id: get_str_param!(params, "library_id", "libraryId").map(String::from),
        },
        "load-more-components" => UiMessage::LoadMoreComponents,
        "refresh-components" => UiMessage::RefreshComponents,
        "sync-library" => UiMessage::SyncLibrary {
            library_id: require_str_param!(params, "library_id", "libraryId"),
        },
        "cancel" => UiMessage::Cancel,
        _ => {
            warn!("Method not found: {}", method);
            return Err(PaletteError::Other(format!("Method not found: {}", method)));
        }
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_accepts_both_param_styles() {
        let camel = parse_message(
            "insert-component",
            &json!({"componentId": "1:1", "libraryId": "lib-a"}),
        )
        .unwrap();
        let snake = parse_message(
            "insert-component",
            &json!({"component_id": "1:1", "library_id": "lib-a"}),
        )
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.kind(), "insert-component");
    }

    #[test]
    fn test_parse_message_requires_ids() {
        let err = parse_message("sync-library", &json!({})).unwrap_err();
        assert!(matches!(err, PaletteError::InvalidParams { .. }));
        assert_eq!(err.to_rpc_error_code(), -32602);
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let err = parse_message("get_status", &json!({})).unwrap_err();
        assert!(err.to_string().contains("Method not found"));
    }
}
