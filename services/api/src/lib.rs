use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use portal_realtime_types::ephemeral::{RealtimeSessionRequest, RealtimeSessionResponse};
use portal_realtime_types::EphemeralKeyResponse;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub mod config;

use config::Config;

/// Failures of `POST /api/ephemeral-key`, reported to the caller as
/// `{success: false, error}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("OpenAI API key not configured")]
    MissingApiKey,
    #[error("Failed to create OpenAI session: {0}")]
    Upstream(StatusCode),
    #[error("Failed to generate ephemeral key")]
    Transport(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Upstream(status) => *status,
            ApiError::MissingApiKey | ApiError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = EphemeralKeyResponse::failed(&self.to_string());
        (status, Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    // Configure a permissive CORS policy so pages served elsewhere can fetch keys.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.static_dir.clone();
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/ephemeral-key", post(ephemeral_key));

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app,
    };

    app.layer(cors).with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ephemeral_key(
    State(state): State<AppState>,
) -> Result<Json<EphemeralKeyResponse>, ApiError> {
    let issued = issue_key(&state).await.inspect_err(|e| {
        tracing::error!("Error generating ephemeral key: {}", e);
    })?;
    Ok(Json(issued))
}

/// Creates an upstream realtime session and hands back only its client secret.
async fn issue_key(state: &AppState) -> Result<EphemeralKeyResponse, ApiError> {
    let config = &state.config;
    let api_key = config
        .openai_api_key
        .as_ref()
        .ok_or(ApiError::MissingApiKey)?;

    let request = RealtimeSessionRequest {
        model: config.realtime_model.clone(),
        voice: config.realtime_voice.clone(),
    };
    let response = state
        .http
        .post(format!("{}/realtime/sessions", config.openai_base_url))
        .bearer_auth(api_key.expose_secret())
        .json(&request)
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!("Error creating OpenAI session: {}", error_text);
        let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        return Err(ApiError::Upstream(status));
    }

    let session: RealtimeSessionResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    tracing::info!(
        "issued ephemeral key, expires_at={}",
        session.client_secret.expires_at
    );

    Ok(EphemeralKeyResponse::issued(
        &session.client_secret.value,
        session.client_secret.expires_at,
    ))
}

/// Binds `config.bind_address` and serves until the process is stopped.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.bind_address;
    let app = router(AppState::new(config));

    tracing::info!("Starting API server, listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
