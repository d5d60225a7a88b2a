use crate::{
    constants::CHAIN_PATH,
    state::{AppState, MineError, SyncStatsSnapshot},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{peer, Block, ChainResponse, LedgerError, Transaction};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route(CHAIN_PATH, get(full_chain))
        .route("/mine", get(mine_block))
        .route("/transactions/new", post(new_transaction))
        .route("/nodes/add_nodes", post(add_nodes))
        .route("/nodes/sync", get(sync))
        .route("/nodes/sync/stats", get(sync_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    MalformedInput(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Mine(#[from] MineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MalformedInput(_) | ApiError::Ledger(LedgerError::InvalidAddress(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Ledger(LedgerError::StaleProof { .. })
            | ApiError::Mine(MineError::Ledger(LedgerError::StaleProof { .. }))
            | ApiError::Mine(MineError::Cancelled) => StatusCode::CONFLICT,
            ApiError::Ledger(_) | ApiError::Mine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub hash_of_previous_block: String,
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
}

impl From<Block> for MineResponse {
    fn from(block: Block) -> Self {
        Self {
            message: "New Block Mined".to_string(),
            index: block.index,
            hash_of_previous_block: block.hash_of_previous_block,
            nonce: block.nonce,
            transactions: block.transactions,
        }
    }
}

#[derive(Deserialize)]
pub struct NewTransaction {
    sender: Option<String>,
    recipient: Option<String>,
    amount: Option<f64>,
}

#[derive(Deserialize)]
pub struct RegisterNodes {
    nodes: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub message: String,
    pub nodes: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SyncResponse {
    pub message: String,
    pub changed: bool,
    pub blockchain: Vec<Block>,
}

async fn full_chain(State(state): State<AppState>) -> Json<ChainResponse> {
    let ledger = state.ledger.read().await;
    Json(ChainResponse::new(ledger.chain().to_vec()))
}

async fn mine_block(State(state): State<AppState>) -> Result<Json<MineResponse>, ApiError> {
    let block = state.mine().await?;
    Ok(Json(block.into()))
}

async fn new_transaction(
    State(state): State<AppState>,
    payload: Result<Json<NewTransaction>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(tx) = payload.map_err(|e| ApiError::MalformedInput(e.body_text()))?;
    let (Some(sender), Some(recipient), Some(amount)) = (tx.sender, tx.recipient, tx.amount)
    else {
        return Err(ApiError::MalformedInput("Missing fields".into()));
    };
    let index = state
        .ledger
        .write()
        .await
        .add_transaction(sender, recipient, amount);
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to Block {index}"),
        }),
    ))
}

async fn add_nodes(
    State(state): State<AppState>,
    payload: Result<Json<RegisterNodes>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::MalformedInput(e.body_text()))?;
    let nodes = body
        .nodes
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::MalformedInput("Error: Missing node(s) info".into()))?;
    // Reject the whole request before registering anything.
    if let Some(bad) = nodes.iter().find(|a| peer::network_location(a).is_none()) {
        return Err(LedgerError::InvalidAddress(bad.clone()).into());
    }

    let mut ledger = state.ledger.write().await;
    for address in &nodes {
        ledger.add_node(address)?;
    }
    let nodes: Vec<String> = ledger.peers().iter().cloned().collect();
    info!(count = nodes.len(), "peer set updated");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "New nodes added".into(),
            nodes,
        }),
    ))
}

async fn sync(State(state): State<AppState>) -> Json<SyncResponse> {
    let changed = state.sync_once().await;
    let blockchain = state.ledger.read().await.chain().to_vec();
    let message = if changed {
        "The blockchain has been updated to the latest"
    } else {
        "Our blockchain is the latest"
    };
    Json(SyncResponse {
        message: message.into(),
        changed,
        blockchain,
    })
}

async fn sync_stats(State(state): State<AppState>) -> Json<SyncStatsSnapshot> {
    Json(state.sync_stats())
}
