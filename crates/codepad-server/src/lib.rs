//! HTTP front end for the playground.
//!
//! Exposes the execution engine to the browser editor: `/run` executes a submission and
//! attaches a complexity estimate, `/generate` and `/suggest` proxy the code assistant,
//! and `/health` reports the active isolation backend.

pub mod error;

pub use error::{Result, ServerError};

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use codepad_core::{
    AssistTask, CodeAssistant, ExecutionEngine, ExecutionRequest, Language, ServerSettings,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub isolation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub output: String,
    pub time: String,
    pub space: String,
    pub summary: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub task: String,
    pub content: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestRequest {
    pub code: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestion: String,
}

/// Configuration for the playground server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            cors_origins: None,
            max_body_size: 256 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server settings from the YAML configuration.
    pub fn from_settings(settings: &ServerSettings) -> Result<Self> {
        let config = Self::new()
            .with_bind_addr_str(&settings.bind_addr)?
            .with_max_body_size(settings.max_body_size);
        Ok(if settings.cors_origins.is_empty() {
            config
        } else {
            config.with_cors_origins(settings.cors_origins.clone())
        })
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address '{}': {}", addr, e)))?;
        Ok(self)
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ExecutionEngine>,
    pub assistant: Option<Arc<CodeAssistant>>,
}

fn parse_language(language: &str) -> Result<Language> {
    language.parse::<Language>().map_err(ServerError::from)
}

async fn run_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>> {
    let Json(payload) = payload.map_err(|e| ServerError::invalid_request(e.body_text()))?;
    let request = ExecutionRequest::parse(&payload.language, payload.code, payload.input)?;

    let report = state.engine.run(&request).await?;

    Ok(Json(RunResponse {
        output: report.result.output(),
        time: report.complexity.time,
        space: report.complexity.space,
        summary: report.complexity.summary,
        exit_code: report.result.exit_code,
        timed_out: report.result.timed_out,
        status: report.result.status.to_string(),
    }))
}

async fn generate_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>> {
    let Json(payload) = payload.map_err(|e| ServerError::invalid_request(e.body_text()))?;
    let language = parse_language(&payload.language)?;
    let task: AssistTask = payload
        .task
        .parse()
        .map_err(|_| ServerError::invalid_request(format!("Unknown task: {}", payload.task)))?;

    let assistant = state.assistant.as_ref().ok_or_else(|| {
        ServerError::AssistantUnavailable("no API key configured".to_string())
    })?;

    log::info!("Assistant task '{}' for {}", task, language);
    let code = assistant.generate(task, &payload.content, language).await?;
    Ok(Json(GenerateResponse { code }))
}

async fn suggest_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SuggestRequest>, JsonRejection>,
) -> Result<Json<SuggestResponse>> {
    let Json(payload) = payload.map_err(|e| ServerError::invalid_request(e.body_text()))?;
    let language = parse_language(&payload.language)?;

    let suggestion = match &state.assistant {
        Some(assistant) => assistant.suggest(&payload.code, language).await,
        None => String::new(),
    };
    Ok(Json(SuggestResponse { suggestion }))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        isolation: state.engine.backend().to_string(),
    })
}

pub struct PlaygroundServer {
    state: AppState,
    config: ServerConfig,
}

impl PlaygroundServer {
    pub fn new(engine: Arc<ExecutionEngine>) -> Self {
        Self {
            state: AppState {
                engine,
                assistant: None,
            },
            config: ServerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_assistant(mut self, assistant: Arc<CodeAssistant>) -> Self {
        self.state.assistant = Some(assistant);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let cors_layer = match &self.config.cors_origins {
            Some(origins) => {
                let origins: std::result::Result<Vec<_>, _> =
                    origins.iter().map(|s| s.parse()).collect();
                match origins {
                    Ok(origins) => CorsLayer::new()
                        .allow_origin(origins)
                        .allow_methods(Any)
                        .allow_headers(Any),
                    Err(_) => {
                        log::warn!("Invalid CORS origin in configuration, allowing any origin");
                        CorsLayer::permissive()
                    }
                }
            }
            None => CorsLayer::permissive(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/run", post(run_handler))
            .route("/generate", post(generate_handler))
            .route("/suggest", post(suggest_handler))
            .with_state(self.state.clone())
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer)
    }

    /// Start the server with graceful shutdown support.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;
        self.serve_on_listener(listener, shutdown_signal).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on_listener<F>(self, listener: TcpListener, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let addr = listener.local_addr()?;

        log::info!(
            "Codepad server listening on {} (isolation: {}, advisor: {}, assistant: {})",
            addr,
            self.state.engine.backend(),
            self.state.engine.has_advisor(),
            self.state.assistant.is_some()
        );
        log::info!("Run endpoint: http://{}/run", addr);
        log::info!("Health check: http://{}/health", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("Codepad server shut down gracefully");
        Ok(())
    }
}

/// Utility function to create a shutdown signal from Ctrl+C.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
