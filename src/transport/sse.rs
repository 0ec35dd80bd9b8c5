//! SSE transport — a multi-client streamed-event service.
//!
//! Operational model: the server process is started independently and
//! outlives any client. `GET /sse` opens a session: the response is an
//! event stream whose first event (`endpoint`) names the session's inbox
//! URL, `POST /messages/:session_id`. Requests posted there are queued to
//! the session's worker, which dispatches them one at a time and streams
//! each response back as a `message` event — so responses within a session
//! keep request order, while separate sessions proceed concurrently over
//! the shared immutable registry.
//!
//! A disconnect drops the session's event stream. An in-flight subprocess
//! started on that session's behalf runs to completion; its response is
//! simply discarded when the worker finds the stream gone.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::protocol::{self, RpcRequest, ServerIdentity};
use crate::session::Session;
use crate::transport::TransportKind;

/// Per-session inbound queue depth. A client that outruns its own event
/// stream this far gets backpressure on POST.
const SESSION_QUEUE_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Shared state for the SSE service.
#[derive(Clone)]
pub struct SseState {
    dispatcher: Dispatcher,
    identity: ServerIdentity,
    /// Live sessions, keyed by id; the value is the session's inbox.
    sessions: Arc<DashMap<Uuid, mpsc::Sender<RpcRequest>>>,
}

impl SseState {
    pub fn new(dispatcher: Dispatcher, identity: ServerIdentity) -> Self {
        Self {
            dispatcher,
            identity,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Number of currently open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// The streamed-event binding.
pub struct SseServer {
    state: SseState,
    bind_addr: String,
}

impl SseServer {
    pub fn new(dispatcher: Dispatcher, identity: ServerIdentity, bind_addr: String) -> Self {
        Self {
            state: SseState::new(dispatcher, identity),
            bind_addr,
        }
    }

    /// Build the axum router.
    pub fn router(&self) -> Router {
        app_router(self.state.clone())
    }

    /// Bind and serve until interrupted.
    pub async fn serve(self) -> Result<(), anyhow::Error> {
        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        log::info!("sse transport listening on {}", self.bind_addr);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                log::info!("shutdown signal received");
            })
            .await?;
        Ok(())
    }
}

/// Build the axum router for the SSE service.
pub fn app_router(state: SseState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/sse", get(sse_handler))
        .route("/messages/:session_id", post(message_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health — liveness probe.
async fn health_handler(State(state): State<SseState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.identity.name,
        "version": state.identity.version,
        "sessions": state.session_count(),
    }))
}

/// GET /sse — open a session and stream its responses.
async fn sse_handler(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = Session::new(TransportKind::Sse);
    let (inbound_tx, inbound_rx) = mpsc::channel(SESSION_QUEUE_DEPTH);
    let (outbound_tx, outbound_rx) = mpsc::channel(SESSION_QUEUE_DEPTH);

    state.sessions.insert(session.id, inbound_tx);
    log::info!("session {} opened", session.id);

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages/{}", session.id));

    tokio::spawn(session_worker(state, session, inbound_rx, outbound_tx));

    let responses = stream::unfold(outbound_rx, |mut rx| async move {
        rx.recv().await.map(|frame: Value| (frame, rx))
    })
    .map(|frame| Event::default().event("message").data(frame.to_string()));

    let events = stream::once(async move { endpoint })
        .chain(responses)
        .map(Ok::<Event, Infallible>);

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// POST /messages/:session_id — enqueue one request for a session.
async fn message_handler(
    State(state): State<SseState>,
    Path(session_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let session_id = match Uuid::parse_str(&session_id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "malformed session id"})),
            );
        }
    };

    let rpc: RpcRequest = match serde_json::from_value(body) {
        Ok(rpc) => rpc,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(protocol::parse_error_frame()),
            );
        }
    };

    let inbox = match state.sessions.get(&session_id) {
        Some(entry) => entry.value().clone(),
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": format!("unknown session: {}", session_id)})),
            );
        }
    };

    if inbox.send(rpc).await.is_err() {
        // Worker already tore down; the entry is stale.
        state.sessions.remove(&session_id);
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("session closed: {}", session_id)})),
        );
    }

    (StatusCode::ACCEPTED, Json(serde_json::json!({"status": "accepted"})))
}

// ---------------------------------------------------------------------------
// Session worker
// ---------------------------------------------------------------------------

/// Drain one session's inbox in order, streaming responses back.
///
/// Exits when the client disconnects (event stream dropped) or the inbox
/// closes, then unregisters the session.
async fn session_worker(
    state: SseState,
    session: Session,
    mut inbound: mpsc::Receiver<RpcRequest>,
    outbound: mpsc::Sender<Value>,
) {
    loop {
        let rpc = tokio::select! {
            maybe = inbound.recv() => match maybe {
                Some(rpc) => rpc,
                None => break,
            },
            _ = outbound.closed() => break,
        };

        if let Some(frame) =
            protocol::handle_rpc(&state.dispatcher, &session, &state.identity, rpc).await
        {
            if outbound.send(frame).await.is_err() {
                // Client went away mid-dispatch; discard the result.
                break;
            }
        }
    }

    state.sessions.remove(&session.id);
    log::info!("session {} closed", session.id);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use futures::StreamExt;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::capability::{CapabilityDescriptor, CapabilityOutput, FnHandler};
    use crate::registry::RegistryBuilder;

    fn test_state() -> SseState {
        let mut builder = RegistryBuilder::new();
        builder
            .register(CapabilityDescriptor::tool(
                "greet",
                "Greet",
                vec![],
                Arc::new(FnHandler::new(Arc::new(|_args| {
                    Box::pin(async { Ok(CapabilityOutput::Text("Hello!".into())) })
                }))),
            ))
            .unwrap();
        SseState::new(
            Dispatcher::new(Arc::new(builder.build())),
            ServerIdentity {
                name: "sysmcp-test".into(),
                version: "0.0.0".into(),
            },
        )
    }

    fn rpc(method: &str, id: i64, params: Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".into(),
            id: json!(id),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app_router(test_state());
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["service"], "sysmcp-test");
    }

    #[tokio::test]
    async fn test_post_to_unknown_session_is_not_found() {
        let app = app_router(test_state());
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(format!("/messages/{}", Uuid::new_v4()))
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_to_malformed_session_id_is_bad_request() {
        let app = app_router(test_state());
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/messages/not-a-uuid")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sse_stream_announces_endpoint() {
        let app = app_router(test_state());
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/sse")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let mut body = response.into_body().into_data_stream();
        let first = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .expect("timed out waiting for first event")
            .unwrap()
            .unwrap();
        let text = String::from_utf8(first.to_vec()).unwrap();
        assert!(text.contains("event: endpoint"));
        assert!(text.contains("/messages/"));
    }

    #[tokio::test]
    async fn test_posted_request_flows_through_registered_session() {
        let state = test_state();
        let session = Session::new(TransportKind::Sse);
        let (inbound_tx, inbound_rx) = mpsc::channel(4);
        let (outbound_tx, mut outbound_rx) = mpsc::channel(4);
        state.sessions.insert(session.id, inbound_tx);
        tokio::spawn(session_worker(
            state.clone(),
            session.clone(),
            inbound_rx,
            outbound_tx,
        ));

        let app = app_router(state);
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(format!("/messages/{}", session.id))
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({
                            "jsonrpc": "2.0",
                            "id": 1,
                            "method": "tools/call",
                            "params": {"name": "greet", "arguments": {}},
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let frame = tokio::time::timeout(Duration::from_secs(2), outbound_rx.recv())
            .await
            .expect("timed out waiting for response frame")
            .unwrap();
        assert_eq!(frame["id"], 1);
        assert_eq!(frame["result"]["content"][0]["text"], "Hello!");
    }

    #[tokio::test]
    async fn test_worker_preserves_request_order() {
        let state = test_state();
        let session = Session::new(TransportKind::Sse);
        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);
        tokio::spawn(session_worker(
            state,
            session,
            inbound_rx,
            outbound_tx,
        ));

        for i in 1..=3 {
            inbound_tx.send(rpc("ping", i, json!({}))).await.unwrap();
        }

        for expected in 1..=3 {
            let frame = tokio::time::timeout(Duration::from_secs(2), outbound_rx.recv())
                .await
                .expect("timed out")
                .unwrap();
            assert_eq!(frame["id"], expected);
        }
    }

    #[tokio::test]
    async fn test_disconnect_unregisters_session() {
        let state = test_state();
        let session = Session::new(TransportKind::Sse);
        let (inbound_tx, inbound_rx) = mpsc::channel(4);
        let (outbound_tx, outbound_rx) = mpsc::channel(4);
        state.sessions.insert(session.id, inbound_tx);
        let worker = tokio::spawn(session_worker(
            state.clone(),
            session.clone(),
            inbound_rx,
            outbound_tx,
        ));

        assert_eq!(state.session_count(), 1);
        drop(outbound_rx);
        worker.await.unwrap();
        assert_eq!(state.session_count(), 0);
    }
}
