mod api;
mod constants;
mod http_source;
mod state;

use clap::Parser;
use constants::{DEFAULT_PEER_TIMEOUT_MS, NODE_ID_BYTES};
use http_source::HttpChainSource;
use ledger_core::Ledger;
use state::AppState;
use std::{net::SocketAddr, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledger-node", about = "Proof-of-work ledger node")]
struct Args {
    /// Port to listen on
    port: u16,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Per-peer request timeout during synchronization, in milliseconds
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT_MS)]
    peer_timeout_ms: u64,

    /// Run a synchronization pass every N seconds (0 disables)
    #[arg(long, default_value_t = 0)]
    sync_interval_secs: u64,
}

fn node_identifier() -> String {
    hex::encode(rand::random::<[u8; NODE_ID_BYTES]>())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let node_id = node_identifier();
    let ledger = tokio::task::spawn_blocking(Ledger::new).await?;
    let peers = HttpChainSource::new(Duration::from_millis(args.peer_timeout_ms))?;
    let state = AppState::new(ledger, node_id.as_str(), peers);

    if args.sync_interval_secs > 0 {
        let state = state.clone();
        let period = Duration::from_secs(args.sync_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                state.sync_once().await;
            }
        });
    }

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!(%node_id, "ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
