//! REST API server for the company research agent
//!
//! Exposes the orchestrator via HTTP endpoints for the chat UI: chat turns
//! over `POST /api/chat` and live state updates over SSE at `GET /api/events`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::agent::Orchestrator;
use crate::error::ResearchError;
use crate::models::TurnResult;
use crate::state::UiIntent;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
    /// Applied in order before the last user message runs.
    #[serde(default)]
    pub intents: Vec<UiIntent>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only stream updates of this thread. All threads when absent.
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Helpers
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

/// Client ids that are not UUIDs map to a stable UUID; no id starts a new thread.
fn resolve_thread_id(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => uuid::Uuid::parse_str(v)
            .unwrap_or_else(|_| stable_uuid_from_string(v))
            .to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    }
}

fn error_status(error: &ResearchError) -> StatusCode {
    match error {
        ResearchError::NoPendingApproval(_) | ResearchError::InvalidToolInput(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_message = req
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.trim())
        .filter(|m| !m.is_empty());

    if user_message.is_none() && req.intents.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("No user message or intent found".into())),
        );
    }

    let thread_id = resolve_thread_id(req.thread_id.as_deref());
    info!(
        thread_id = %thread_id,
        intents = req.intents.len(),
        has_message = user_message.is_some(),
        "Chat request received"
    );

    let mut intent_events = Vec::new();
    let mut last: Option<TurnResult> = None;

    for intent in req.intents {
        match state.orchestrator.handle_intent(&thread_id, intent).await {
            Ok(result) => {
                intent_events.extend(result.events.iter().cloned());
                last = Some(result);
            }
            Err(e) => {
                warn!(thread_id = %thread_id, error = %e, "Intent rejected");
                return (error_status(&e), Json(ApiResponse::error(e.to_string())));
            }
        }
    }

    if let Some(message) = user_message {
        match state.orchestrator.run_turn(&thread_id, message).await {
            Ok(result) => last = Some(result),
            Err(e) => {
                warn!(thread_id = %thread_id, error = %e, "Turn failed");
                return (error_status(&e), Json(ApiResponse::error(e.to_string())));
            }
        }
    }

    match last {
        Some(mut result) => {
            if user_message.is_some() {
                intent_events.append(&mut result.events);
            }
            result.events = intent_events;
            (StatusCode::OK, Json(ApiResponse::success(result)))
        }
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Nothing was processed".into())),
        ),
    }
}

/// =============================
/// State Update Stream
/// =============================

async fn events_handler(
    State(state): State<ApiState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let thread_filter = query
        .thread_id
        .filter(|t| !t.trim().is_empty())
        .map(|t| resolve_thread_id(Some(&t)));
    let mut rx = state.orchestrator.channel().subscribe();

    info!(thread_id = ?thread_filter, "State stream opened");

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if thread_filter.as_deref().is_some_and(|t| t != envelope.thread_id) {
                        continue;
                    }
                    match Event::default()
                        .event(envelope.update.action_name())
                        .json_data(&envelope)
                    {
                        Ok(event) => yield Ok(event),
                        Err(e) => warn!(error = %e, "Failed to encode state update"),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "State stream lagged; updates were dropped");
                    yield Ok(Event::default().event("lagged").data(skipped.to_string()));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("State channel closed");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/events", get(events_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionEngine;
    use crate::planner::IntentPlanner;
    use crate::state::{InMemorySessionStore, StateChannel};
    use crate::store::InMemoryCompanyStore;
    use crate::testing::StubResearch;
    use crate::tools::create_default_registry;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn orchestrator() -> Arc<Orchestrator> {
        let registry = create_default_registry(
            Arc::new(InMemoryCompanyStore::seeded()),
            Arc::new(StubResearch::new()),
        );
        Arc::new(Orchestrator::new(
            Box::new(IntentPlanner),
            ExecutionEngine::new(registry),
            Box::new(InMemorySessionStore::new()),
            StateChannel::default(),
        ))
    }

    fn router() -> Router {
        create_router(orchestrator())
    }

    async fn post_chat(router: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_runs_a_turn() {
        let (status, body) = post_chat(
            router(),
            json!({
                "thread_id": "demo-thread",
                "messages": [
                    {"role": "assistant", "content": "Hi! Which company?"},
                    {"role": "user", "content": "Show me information about Apple"}
                ]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(
            body["data"]["thread_id"],
            stable_uuid_from_string("demo-thread").to_string()
        );
        assert_eq!(body["data"]["status"], "completed");
        assert_eq!(
            body["data"]["state"]["selected_company"]["ticker_symbol"],
            "AAPL"
        );
        assert_eq!(body["data"]["events"][0]["type"], "companies_found");
    }

    #[tokio::test]
    async fn test_intents_apply_before_message() {
        let (status, body) = post_chat(
            router(),
            json!({
                "thread_id": "t-intents",
                "intents": [{"type": "hide_company_card"}],
                "messages": [{"role": "user", "content": "Compare Microsoft and Google"}]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["events"][0]["type"], "company_card_hidden");
        assert!(body["data"]["state"]["comparison"].is_object());
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let (status, body) = post_chat(router(), json!({"messages": []})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_decision_without_pending_approval() {
        let (status, body) = post_chat(
            router(),
            json!({"intents": [{"type": "approval_decision", "approved": true}]}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("No pending approval"));
    }

    #[tokio::test]
    async fn test_event_stream_follows_one_thread() {
        let orchestrator = orchestrator();
        let response = create_router(orchestrator.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/events?thread_id=demo-thread")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let demo = stable_uuid_from_string("demo-thread").to_string();
        orchestrator
            .handle_intent("other-thread", UiIntent::HideCompanyCard)
            .await
            .unwrap();
        orchestrator
            .handle_intent(&demo, UiIntent::HideCompanyCard)
            .await
            .unwrap();

        let mut body = response.into_body().into_data_stream();
        let frame = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();

        assert!(text.contains("event: hideCompanyInfo"));
        assert!(text.contains(&demo));
        assert!(!text.contains("other-thread"));
    }

    #[test]
    fn test_thread_ids_are_stable() {
        let uuid = "6f1c2a9e-4b1d-4c55-9a3e-2f0d8c7b1a11";
        assert_eq!(resolve_thread_id(Some(uuid)), uuid);
        assert_eq!(resolve_thread_id(Some("abc")), resolve_thread_id(Some("abc")));
        assert_ne!(resolve_thread_id(None), resolve_thread_id(None));
    }
}
