use std::sync::Arc;
use std::time::Duration;

use kvreg_core::{NodeState, RaftConfig, RaftTransport};
use tokio::sync::Mutex;

/// Shared handle passed to every axum handler and both background tickers.
#[derive(Clone)]
pub struct AppState {
    pub node: Arc<Mutex<NodeState>>,
    pub config: Arc<RaftConfig>,
    pub transport: Arc<dyn RaftTransport>,
    /// Separate client used for forwarding client data RPCs to the leader;
    /// kept apart from the peer `RaftTransport` since it speaks the client
    /// wire shapes (key/value bodies), not the heartbeat/vote shapes.
    pub forwarding_client: reqwest::Client,
}

/// Blocks the calling task while this node is in its "deadimitation" state,
/// polling every 0.5s, exactly as spec.md's liveness injection describes.
/// Called at the top of every tick of both tickers and both peer RPC
/// handlers; does not affect `turnon`/`turnoff`/`status`, which never call it.
pub async fn await_alive(node: &Mutex<NodeState>) {
    loop {
        if node.lock().await.alive {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
