//! Axum-based HTTP gateway: wires inbound chat events to the survey engine.

use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use survey_core::{
    ConversationEngine, HttpBackend, InMemoryBackend, PiiCipher, Prompt, SurveyConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SurveyConfig::load().expect("load survey config");
    let backend: Arc<dyn survey_core::Backend> = if config.backend_mode == "mock" {
        tracing::warn!("backend_mode=mock, entities are kept in process memory");
        Arc::new(InMemoryBackend::new())
    } else {
        Arc::new(
            HttpBackend::new(
                config.backend_url.clone(),
                Duration::from_secs(config.request_timeout_secs),
            )
            .expect("build backend client"),
        )
    };
    let cipher = PiiCipher::from_env_or_random().expect("load PII key");
    let engine = Arc::new(ConversationEngine::new(backend, cipher));

    let port = config.port;
    let app = router(AppState {
        engine,
        config: Arc::new(config),
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("survey-gateway listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await.expect("bind gateway port"),
        app,
    )
    .await
    .expect("serve gateway");
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", post(handle_event))
        .route("/v1/health", get(health))
        .with_state(state)
}

#[derive(Clone)]
struct AppState {
    engine: Arc<ConversationEngine>,
    config: Arc<SurveyConfig>,
}

#[derive(serde::Deserialize)]
struct EventRequest {
    /// Chat-platform user id; also the session key.
    user_id: i64,
    /// Button token, free text, or a /command.
    input: String,
}

async fn handle_event(
    State(state): State<AppState>,
    Json(req): Json<EventRequest>,
) -> Json<Prompt> {
    let prompt = state.engine.handle_event(req.user_id, &req.input).await;
    Json(prompt)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "app": state.config.app_name,
        "active_sessions": state.engine.active_sessions(),
    }))
}
