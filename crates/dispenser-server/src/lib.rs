use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dispenser_config::Config;
use dispenser_contracts::{
    ChatMessage, ClaimRequest, ClaimResponse, ContractsMetadata, IngestRequest, IngestResponse,
    InventoryReport, MessageResponse,
};

pub mod audit;
pub mod dispatch;
pub mod dispenser;
pub mod error;
pub mod fetch;
pub mod store;

pub use audit::{verify_audit_chain, verify_audit_chain_with_mirror};
pub use dispatch::dispatch_message;
pub use dispenser::Dispenser;
pub use error::{DispenserError, FetchError, StoreError};

pub async fn serve(cfg: Config) -> Result<(), String> {
    let addr: SocketAddr = cfg
        .server
        .listen_addr
        .parse()
        .map_err(|e| format!("invalid listen_addr: {e}"))?;

    let app = build_app(cfg).await?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind failed: {e}"))?;
    tracing::info!(%addr, "dispenser listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("serve failed: {e}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(err = %e, "ctrl-c handler failed; shutting down");
        return;
    }
    tracing::info!("shutdown requested");
}

pub async fn build_app(cfg: Config) -> Result<Router, String> {
    let state = AppState::new(cfg).await?;
    Ok(Router::new()
        .route("/v1/healthz", get(healthz))
        .route("/v1/contracts", get(contracts))
        .route("/v1/claims", post(claims))
        .route("/v1/ingestions", post(ingestions))
        .route("/v1/inventory/report", get(inventory_report))
        .route("/v1/messages", post(messages))
        .with_state(state))
}

#[derive(Clone)]
struct AppState {
    cfg: Arc<Config>,
    dispenser: Arc<Dispenser>,
}

impl AppState {
    async fn new(cfg: Config) -> Result<Self, String> {
        Ok(Self {
            dispenser: Arc::new(Dispenser::from_config(&cfg).await?),
            cfg: Arc::new(cfg),
        })
    }
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn contracts() -> Json<ContractsMetadata> {
    Json(ContractsMetadata::current())
}

async fn claims(
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, DispenserError> {
    state.dispenser.claim_for(&req.requester_id).await.map(Json)
}

async fn ingestions(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, DispenserError> {
    state.dispenser.ingest(&req.input).await.map(Json)
}

async fn inventory_report(
    State(state): State<AppState>,
) -> Result<Json<InventoryReport>, DispenserError> {
    state.dispenser.report().await.map(Json)
}

async fn messages(
    State(state): State<AppState>,
    Json(msg): Json<ChatMessage>,
) -> Result<Json<MessageResponse>, DispenserError> {
    dispatch_message(&state.dispenser, &state.cfg.chat, &msg)
        .await
        .map(Json)
}
