//! Launches the fixed 4-node cluster locally for development, each node as
//! a child `kvreg_node` process with its `SERVER_ID` set. Replaces the
//! original process pool tooling (`steward`), whose supporting `Loc` helper
//! module wasn't available to carry forward; `tokio::process` covers the
//! same need here (spawn N tagged child processes, wait on all of them).

use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::signal;
use tracing::info;

const NUM_NODES: u64 = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut children: Vec<(u64, Child)> = Vec::new();
    for server_id in 1..=NUM_NODES {
        let child = Command::new("cargo")
            .args(["run", "--bin", "kvreg_node"])
            .env("SERVER_ID", server_id.to_string())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .unwrap_or_else(|e| panic!("failed to spawn node {server_id}: {e}"));

        info!(server_id, pid = ?child.id(), "spawned node");
        children.push((server_id, child));
    }

    signal::ctrl_c().await?;
    info!("received ctrl-c, shutting down cluster");

    for (server_id, mut child) in children {
        if let Err(e) = child.kill().await {
            tracing::warn!(server_id, error = %e, "failed to kill node");
        }
    }

    Ok(())
}
