use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, head, patch, post, put};
use axum::Router;
use clap::Parser;
use kvreg_core::{NodeState, RaftConfig, ServerId};
use tokio::sync::Mutex;
use tracing_subscriber::FmtSubscriber;

use kvreg_node::app_state::AppState;
use kvreg_node::reqwest_transport::ReqwestTransport;
use kvreg_node::{handlers, tickers};

/// The fixed 4-node roster spec.md §6 compiles in: ids 1..=4, each
/// listening on `0.0.0.0:(5000 + server_id)`.
const CLUSTER_SIZE: u64 = 4;

fn default_roster() -> HashMap<ServerId, String> {
    (1..=CLUSTER_SIZE)
        .map(|id| (ServerId(id), format!("http://0.0.0.0:{}", 5000 + id)))
        .collect()
}

/// Command-line configuration for a single cluster member.
///
/// `SERVER_ID` remains the primary way to select identity, matching the
/// original Python process (spec.md §6); the flags below are additive
/// conveniences for local development and are not required in normal use.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// This node's id in the cluster. Defaults to the SERVER_ID env var.
    #[arg(long, env = "SERVER_ID")]
    server_id: u64,

    /// Override a roster entry as `id=http://host:port`. May be repeated.
    #[arg(long = "peer", value_parser = parse_peer)]
    peers: Vec<(ServerId, String)>,

    /// Override the leader heartbeat interval, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    heartbeat_interval_ms: u64,

    /// Override the outbound RPC timeout, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    rpc_timeout_ms: u64,
}

fn parse_peer(s: &str) -> Result<(ServerId, String), String> {
    let (id, url) = s
        .split_once('=')
        .ok_or_else(|| format!("expected id=url, got {s}"))?;
    let id: u64 = id.parse().map_err(|_| format!("invalid server id {id}"))?;
    Ok((ServerId(id), url.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut roster = default_roster();
    for (id, url) in args.peers {
        roster.insert(id, url);
    }

    let config = Arc::new(RaftConfig {
        roster: roster.clone(),
        heartbeat_interval: Duration::from_millis(args.heartbeat_interval_ms),
        rpc_timeout: Duration::from_millis(args.rpc_timeout_ms),
        election_timeout_base: Duration::from_secs(4),
        election_timeout_per_id: Duration::from_secs(3),
    });

    let server_id = ServerId(args.server_id);
    let bind_addr = format!("0.0.0.0:{}", 5000 + args.server_id);

    let transport = Arc::new(ReqwestTransport::new(roster, config.rpc_timeout));

    let state = AppState {
        node: Arc::new(Mutex::new(NodeState::new(server_id))),
        config: config.clone(),
        transport,
        forwarding_client: reqwest::Client::new(),
    };

    tokio::spawn(tickers::run_election_ticker(state.clone()));
    tokio::spawn(tickers::run_heartbeat_ticker(state.clone()));

    let app = Router::new()
        .route("/heartbeat", post(handlers::heartbeat))
        .route("/vote", post(handlers::vote))
        .route("/status", get(handlers::status))
        .route("/turnon", get(handlers::turnon))
        .route("/turnoff", get(handlers::turnoff))
        .route("/get_data", get(handlers::get_data))
        .route("/put_data", put(handlers::put_data))
        .route("/post_data", post(handlers::post_data))
        .route("/delete_data", delete(handlers::delete_data))
        .route("/head_data", head(handlers::head_data))
        .route("/update_data", patch(handlers::update_data))
        .with_state(state);

    tracing::info!(server_id = args.server_id, %bind_addr, "starting kvreg_node");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
