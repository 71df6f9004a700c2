// src/test_utils/mock_llm_server.rs
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Scripted answer of the mock chat-completions endpoint.
#[derive(Debug, Clone)]
pub enum MockReply {
    Content(String),
    Status(u16),
    /// Respond with `content` after sleeping.
    Delayed(Duration, String),
}

impl MockReply {
    pub fn content(text: &str) -> Self {
        MockReply::Content(text.to_string())
    }

    pub fn status(code: u16) -> Self {
        MockReply::Status(code)
    }
}

#[derive(Clone)]
struct MockServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<Value>>>,
    auth_headers: Arc<Mutex<Vec<String>>>,
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

async fn chat_completions_handler(
    State(state): State<MockServerState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    log::debug!("Mock LLM server received request: {}", payload);
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.auth_headers.lock().unwrap().push(auth.to_string());
    }
    state.requests.lock().unwrap().push(payload);

    let reply = state.replies.lock().unwrap().pop_front();
    match reply {
        Some(MockReply::Content(text)) => Ok(Json(completion(&text))),
        Some(MockReply::Delayed(delay, text)) => {
            tokio::time::sleep(delay).await;
            Ok(Json(completion(&text)))
        }
        Some(MockReply::Status(code)) => {
            Err(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        }
        None => {
            log::error!("Mock LLM server ran out of responses!");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

pub struct MockLLMServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    recorded_requests: Arc<Mutex<Vec<Value>>>,
    auth_headers: Arc<Mutex<Vec<String>>>,
}

impl MockLLMServer {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = MockServerState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
            auth_headers: Arc::new(Mutex::new(Vec::new())),
        };
        let recorded_requests = state.requests.clone();
        let auth_headers = state.auth_headers.clone();

        let app = Router::new()
            .route("/v1/chat/completions", post(chat_completions_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock server to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Mock LLM server error: {}", e);
                });
        });

        MockLLMServer {
            addr,
            shutdown_tx,
            recorded_requests,
            auth_headers,
        }
    }

    /// Base URL to hand to an OpenAI-compatible client.
    pub fn api_base(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock LLM server shutdown signal already sent or receiver dropped.");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    pub fn get_requests(&self) -> Vec<Value> {
        self.recorded_requests.lock().unwrap().clone()
    }

    pub fn authorization_headers(&self) -> Vec<String> {
        self.auth_headers.lock().unwrap().clone()
    }
}

/// An address nothing listens on.
pub async fn unreachable_api_base() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/v1", addr)
}
