//! HTTP relay between the candidate's browser and the proctoring core.
//!
//! This module provides a local HTTP server that:
//! - Accepts detector frames and browser events via POST /input
//! - Runs them through a single `ProctorSession`
//! - Queues host commands (fullscreen, speech, session end) for the browser
//!   shim to pick up via GET /commands
//!
//! # Architecture
//!
//! ```text
//! Browser shim ──→ POST /input ──→ ProctorSession ──→ GET /status
//!      ▲                                 │
//!      └──────── GET /commands ◀─────────┘
//! ```

use crate::collector::types::{InputKind, SessionInput};
use crate::config::Config;
use crate::host::{EnvironmentHost, HostError, SessionObserver, SpeechControl};
use crate::ledger::WarningEvent;
use crate::lockdown::Disposition;
use crate::session::{ProctorSession, SessionSnapshot};
use crate::store::JsonFileStore;
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

/// How often pending lockdown deadlines are checked.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Candidate being proctored
    pub access_id: String,
    /// Session settings
    pub session: Config,
}

impl ServerConfig {
    pub fn new(port: u16, access_id: &str, session: Config) -> Self {
        Self {
            port,
            access_id: access_id.to_string(),
            session,
        }
    }
}

/// Instruction for the browser shim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    RequestFullscreen,
    ExitFullscreen,
    StartListening,
    StopListening,
    Speak { text: String },
    StopSpeaking,
    /// Persist and navigate to the summary view
    EndSession,
}

type CommandQueue = Arc<StdMutex<Vec<HostCommand>>>;

fn enqueue(queue: &CommandQueue, command: HostCommand) {
    queue
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(command);
}

struct RelayHost(CommandQueue);

impl EnvironmentHost for RelayHost {
    fn request_fullscreen(&mut self) -> Result<(), HostError> {
        enqueue(&self.0, HostCommand::RequestFullscreen);
        Ok(())
    }

    fn exit_fullscreen(&mut self) {
        enqueue(&self.0, HostCommand::ExitFullscreen);
    }
}

struct RelaySpeech(CommandQueue);

impl SpeechControl for RelaySpeech {
    fn start_listening(&mut self) {
        enqueue(&self.0, HostCommand::StartListening);
    }

    fn stop_listening(&mut self) {
        enqueue(&self.0, HostCommand::StopListening);
    }

    fn speak(&mut self, text: &str) {
        enqueue(
            &self.0,
            HostCommand::Speak {
                text: text.to_string(),
            },
        );
    }

    fn stop_speaking(&mut self) {
        enqueue(&self.0, HostCommand::StopSpeaking);
    }
}

struct RelayObserver(CommandQueue);

impl SessionObserver for RelayObserver {
    fn on_warning(&mut self, vision_strikes: u32) {
        tracing::warn!(vision_strikes, "vision warning");
    }

    fn on_violation(&mut self, violation: &WarningEvent) {
        tracing::warn!(kind = %violation.kind, "{}", violation.message);
    }

    fn on_terminate(&mut self) {
        tracing::warn!("session terminated, notifying browser");
        enqueue(&self.0, HostCommand::EndSession);
    }
}

/// Shared server state
pub struct ServerState {
    session: Mutex<ProctorSession>,
    commands: CommandQueue,
}

impl ServerState {
    /// Create server state with a started session.
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let commands = CommandQueue::default();
        let store = JsonFileStore::open(config.session.store_path())?;

        let mut session = ProctorSession::new(
            &config.access_id,
            &config.session,
            Box::new(RelayHost(commands.clone())),
            Box::new(RelaySpeech(commands.clone())),
            Box::new(store),
            Box::new(RelayObserver(commands.clone())),
        );
        session.start();

        Ok(Self {
            session: Mutex::new(session),
            commands,
        })
    }
}

/// Input posted by the browser shim.
///
/// Inputs are stamped with server arrival time so deadlines set here and the
/// poll ticker run on the same clock. A client-supplied `at` is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InputRequest {
    pub input: InputKind,
}

/// Response from the input endpoint
#[derive(Debug, Clone, Serialize)]
pub struct InputResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<Disposition>,
    pub strikes: u32,
    pub terminated: bool,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /input
async fn input(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<InputRequest>,
) -> Result<Json<InputResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut session = state.session.lock().await;
    let at = Utc::now();

    if session.is_terminated() && !matches!(request.input, InputKind::Frame(_)) {
        return Err((
            StatusCode::GONE,
            Json(ErrorResponse {
                error: "Session has been terminated".to_string(),
                code: "SESSION_TERMINATED".to_string(),
            }),
        ));
    }

    let disposition = session.apply(&SessionInput::new(at, request.input));

    Ok(Json(InputResponse {
        disposition,
        strikes: session.ledger().strike_count(),
        terminated: session.is_terminated(),
    }))
}

/// POST /dismiss
async fn dismiss(State(state): State<Arc<ServerState>>) -> StatusCode {
    state.session.lock().await.dismiss_overlay();
    StatusCode::NO_CONTENT
}

/// GET /status
async fn status(State(state): State<Arc<ServerState>>) -> Json<SessionSnapshot> {
    Json(state.session.lock().await.snapshot())
}

/// GET /commands
async fn commands(State(state): State<Arc<ServerState>>) -> Json<Vec<HostCommand>> {
    let drained = std::mem::take(&mut *state.commands.lock().unwrap_or_else(|e| e.into_inner()));
    Json(drained)
}

/// Build the router for a given state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/input", post(input))
        .route("/dismiss", post(dismiss))
        .route("/status", get(status))
        .route("/commands", get(commands))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config)?);
    let app = router(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Proctoring relay listening on http://{}", actual_addr);

    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            interval.tick().await;
            state.session.lock().await.poll(Utc::now());
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
        ticker.abort();
    });

    Ok((actual_addr, shutdown_tx))
}
