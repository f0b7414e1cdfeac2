//! HTTP API backing the claim pages

use crate::config::ServerConfig;
use crate::error::{ClaimError, ClaimResult};
use crate::session::{SessionManager, SessionView};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub explainer_url: String,
}

/// Build the router; split out so tests can drive it without a socket
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/how", get(how_it_works))
        .route("/sessions", post(open_session))
        .route("/sessions/:id", get(get_session).delete(close_session))
        .route("/sessions/:id/connect", post(connect))
        .route("/sessions/:id/disconnect", post(disconnect))
        .route("/sessions/:id/mint", post(mint))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ServerConfig, state: AppState) -> ClaimResult<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ClaimError::Config(format!("bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| ClaimError::Config(format!("API server: {}", e)))?;

    Ok(())
}

/// Error body returned for every failed request
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    notice: String,
}

struct ApiError(ClaimError);

impl From<ClaimError> for ApiError {
    fn from(e: ClaimError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ClaimError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ClaimError::MintInProgress => StatusCode::CONFLICT,
            ClaimError::WalletNotConnected
            | ClaimError::Encoding(_)
            | ClaimError::MissingField(_) => StatusCode::BAD_REQUEST,
            ClaimError::SigningServiceNotReady | ClaimError::AuthUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ClaimError::UnknownChain { .. } | ClaimError::MissingSigningKey => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ClaimError::GasEstimationFailed(_)
            | ClaimError::SigningExecutionFailed(_)
            | ClaimError::BroadcastFailed(_)
            | ClaimError::Rpc(_) => StatusCode::BAD_GATEWAY,
            ClaimError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ClaimError::MetadataFetchFailed(_) | ClaimError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse {
            error: self.0.kind(),
            notice: self.0.user_notice(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint - basic liveness
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.sessions.len(),
    })
}

/// The explainer page: a link to the external document
async fn how_it_works(State(state): State<AppState>) -> impl IntoResponse {
    Json(HowResponse {
        title: "How it works".to_string(),
        link: state.explainer_url.clone(),
    })
}

async fn open_session(
    State(state): State<AppState>,
    Json(body): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let account: Address = body
        .address
        .parse()
        .map_err(|_| ClaimError::Encoding(format!("invalid address {}", body.address)))?;

    let session = state.sessions.open(account);
    Ok((StatusCode::CREATED, Json(session.view().await)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get(&id)?;
    Ok(Json(session.view().await))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let session = state.sessions.get(&id)?;
    session.disconnect().await;
    state.sessions.close(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn connect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get(&id)?;
    Ok(Json(session.connect().await?))
}

async fn disconnect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get(&id)?;
    Ok(Json(session.disconnect().await))
}

async fn mint(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get(&id)?;
    Ok(Json(session.mint().await?))
}

// Request / response types

#[derive(Deserialize)]
struct OpenSessionRequest {
    address: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    sessions: usize,
}

#[derive(Serialize)]
struct HowResponse {
    title: String,
    link: String,
}
