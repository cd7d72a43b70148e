//! Ledger node: an axum server over a sled-backed ledger that talks to its
//! peers over HTTP.

pub mod api;
pub mod config;
pub mod transport;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use ledger_core::config::NodeIdentity;
use ledger_core::consensus::ConsensusResolver;
use ledger_core::chain::Ledger;
use ledger_core::mine::Miner;
use ledger_core::registry::{NodeRegistry, NodeStore};
use ledger_storage::SledStore;
use tower_http::trace::TraceLayer;

pub use crate::transport::HttpTransport;
use crate::api::routes;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger<SledStore>,
    pub miner: Arc<Miner<SledStore>>,
    pub registry: NodeRegistry<SledStore, HttpTransport>,
    pub resolver: Arc<ConsensusResolver<SledStore, SledStore, HttpTransport>>,
}

impl AppState {
    /// Wires every component over one store and makes sure the genesis
    /// block exists.
    pub fn new(
        store: SledStore,
        identity: NodeIdentity,
        transport: HttpTransport,
    ) -> ledger_core::Result<Self> {
        let store = Arc::new(store);
        let ledger = Ledger::new(Arc::clone(&store));
        ledger.ensure_genesis()?;
        let registry = NodeRegistry::new(store, Arc::new(transport), identity.clone());
        let miner = Arc::new(Miner::new(ledger.clone(), identity));
        let resolver = Arc::new(ConsensusResolver::new(ledger.clone(), registry.clone()));
        Ok(Self {
            ledger,
            miner,
            registry,
            resolver,
        })
    }
}

/// Explicit uuid, else the one this url registered under before, else a
/// fresh one.
pub fn resolve_identity(
    store: &SledStore,
    url: String,
    uuid: Option<String>,
) -> ledger_core::Result<NodeIdentity> {
    if let Some(uuid) = uuid {
        return Ok(NodeIdentity::new(url, uuid));
    }
    match store.find_node(&url)? {
        Some(node) => Ok(NodeIdentity::new(url, node.uuid)),
        None => Ok(NodeIdentity::generate(url)),
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route(routes::HEALTH, get(api::health))
        .route(routes::NODES, get(api::get_nodes))
        .route(routes::ADD_NODE, post(api::add_node))
        .route(routes::DELETE_NODE, post(api::delete_node))
        .route(routes::CHAIN, get(api::get_chain))
        .route(routes::MINE, post(api::mine))
        .route(routes::TRANSACTIONS, post(api::add_transaction))
        .route(routes::RESOLVE, post(api::resolve))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
