use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use ledger_node::config::Args;
use ledger_node::{app, resolve_identity, AppState, HttpTransport};
use ledger_storage::SledStore;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = SledStore::open(&args.data_dir)?;
    let identity = resolve_identity(&store, args.node_url(), args.node_uuid.clone())?;
    info!(url = %identity.url, uuid = %identity.uuid, "node identity");

    let transport = HttpTransport::new(Duration::from_secs(args.peer_timeout_secs))?;
    let state = AppState::new(store, identity, transport)?;

    let addr: SocketAddr = args.listen.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let report = state
        .registry
        .bootstrap(args.neighbour.as_deref(), &state.resolver)
        .await?;
    info!(?report, "bootstrap finished");

    info!("ledger-node listening on http://{addr}");
    axum::serve(listener, app(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.ledger.store().flush()?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}
