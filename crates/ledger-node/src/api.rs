//! HTTP surface of a node.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ledger_core::constants::SUCCESS;
use ledger_core::transport::PeerNode;
use ledger_core::{Block, Error, NewTransaction};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::AppState;

pub mod routes {
    pub const HEALTH: &str = "/health";
    pub const NODES: &str = "/nodes";
    pub const ADD_NODE: &str = "/nodes/add";
    pub const DELETE_NODE: &str = "/nodes/delete";
    pub const CHAIN: &str = "/chain";
    pub const MINE: &str = "/mine";
    pub const TRANSACTIONS: &str = "/transactions";
    pub const RESOLVE: &str = "/resolve";
}

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct NodeIn {
    url: Option<String>,
    uuid: Option<String>,
}

#[derive(Deserialize)]
pub struct NodeUrl {
    url: Option<String>,
}

/// Every failure leaves the node as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Ledger(Error),
    BadRequest(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Ledger(err) => {
                let status = match &err {
                    Error::Validation(_) => StatusCode::BAD_REQUEST,
                    Error::NotFound(_) => StatusCode::NOT_FOUND,
                    Error::Conflict(_) => StatusCode::CONFLICT,
                    Error::Transport(_) => StatusCode::BAD_GATEWAY,
                    Error::Persistence(_) | Error::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!(error = %err, "request failed");
                }
                (status, err.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => {
                error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub async fn get_nodes(State(state): State<AppState>) -> ApiResult<Vec<PeerNode>> {
    let nodes = state.registry.list()?;
    Ok(Json(nodes.into_iter().map(PeerNode::from).collect()))
}

pub async fn add_node(
    State(state): State<AppState>,
    body: Result<Json<NodeIn>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(node) = body?;
    let node = state.registry.register(
        node.url.as_deref().unwrap_or_default(),
        node.uuid.as_deref().unwrap_or_default(),
    )?;
    info!(url = %node.url, "node added");
    Ok(Json(json!({ "addNode": SUCCESS })))
}

pub async fn delete_node(
    State(state): State<AppState>,
    body: Result<Json<NodeUrl>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(node) = body?;
    let url = node.url.unwrap_or_default();
    state.registry.deregister(&url)?;
    info!(%url, "node deleted");
    Ok(Json(json!({ "deleteNode": SUCCESS })))
}

pub async fn get_chain(State(state): State<AppState>) -> ApiResult<Vec<Block>> {
    Ok(Json(state.ledger.full_chain()?))
}

/// Proof search is CPU bound, so it runs off the async workers.
pub async fn mine(State(state): State<AppState>) -> ApiResult<Block> {
    let miner = state.miner.clone();
    let block = tokio::task::spawn_blocking(move || miner.mine())
        .await
        .map_err(|e| ApiError::Internal(format!("mining task failed: {e}")))??;
    Ok(Json(block))
}

pub async fn add_transaction(
    State(state): State<AppState>,
    body: Result<Json<NewTransaction>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(tx) = body?;
    // Waits on the ledger write lock, which a running mine may hold.
    let ledger = state.ledger.clone();
    tokio::task::spawn_blocking(move || ledger.add_transaction(&tx))
        .await
        .map_err(|e| ApiError::Internal(format!("transaction task failed: {e}")))??;
    Ok(Json(json!({ "addTransaction": SUCCESS })))
}

/// Peer chains are fetched on the async workers; installing the winner waits
/// on the ledger write lock, so that step runs off them like `mine`.
pub async fn resolve(State(state): State<AppState>) -> ApiResult<Value> {
    let candidate = state.resolver.longest_valid_chain().await?;
    let resolver = state.resolver.clone();
    let resolution = tokio::task::spawn_blocking(move || resolver.adopt(candidate))
        .await
        .map_err(|e| ApiError::Internal(format!("resolve task failed: {e}")))??;
    Ok(Json(json!({ "resolveConflicts": resolution.status() })))
}
