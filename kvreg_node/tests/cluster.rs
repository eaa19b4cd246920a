//! Boots real axum servers on loopback ports and drives them with reqwest,
//! exercising the election/replication/forwarding scenarios from spec.md §8
//! end-to-end without a network simulator.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::{delete, get, head, patch, post, put};
use axum::Router;
use kvreg_core::{NodeState, RaftConfig, ServerId, StatusResponse};
use kvreg_node::app_state::AppState;
use kvreg_node::reqwest_transport::ReqwestTransport;
use kvreg_node::{handlers, tickers};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

struct TestNode {
    addr: SocketAddr,
    _server: JoinHandle<()>,
    _election: JoinHandle<()>,
    _heartbeat: JoinHandle<()>,
}

impl TestNode {
    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Spins up `count` nodes on consecutive loopback ports, each with the full
/// roster and a fast heartbeat/election config so tests don't wait minutes.
async fn spin_up_cluster(count: u64) -> Vec<TestNode> {
    let mut ports = Vec::new();
    for _ in 0..count {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        ports.push(listener.local_addr().unwrap());
        drop(listener);
    }

    let roster: HashMap<ServerId, String> = ports
        .iter()
        .enumerate()
        .map(|(i, addr)| (ServerId(i as u64 + 1), format!("http://{addr}")))
        .collect();

    let config = Arc::new(RaftConfig {
        roster: roster.clone(),
        heartbeat_interval: Duration::from_millis(150),
        rpc_timeout: Duration::from_millis(300),
        election_timeout_base: Duration::from_millis(400),
        election_timeout_per_id: Duration::from_millis(200),
    });

    let mut nodes = Vec::new();
    for (i, addr) in ports.into_iter().enumerate() {
        let server_id = ServerId(i as u64 + 1);
        let transport = Arc::new(ReqwestTransport::new(roster.clone(), config.rpc_timeout));
        let state = AppState {
            node: Arc::new(Mutex::new(NodeState::new(server_id))),
            config: config.clone(),
            transport,
            forwarding_client: reqwest::Client::new(),
        };

        let election = tokio::spawn(tickers::run_election_ticker(state.clone()));
        let heartbeat = tokio::spawn(tickers::run_heartbeat_ticker(state.clone()));

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

        let listener = TcpListener::bind(addr).await.unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        nodes.push(TestNode {
            addr,
            _server: server,
            _election: election,
            _heartbeat: heartbeat,
        });
    }

    nodes
}

async fn wait_for_condition<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn status(client: &reqwest::Client, node: &TestNode) -> StatusResponse {
    client
        .get(format!("{}/status", node.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn cluster_elects_exactly_one_leader() {
    let nodes = spin_up_cluster(4).await;
    let client = reqwest::Client::new();

    let elected = wait_for_condition(Duration::from_secs(5), || async {
        let mut leaders = 0;
        for node in &nodes {
            if status(&client, node).await.state == "leader" {
                leaders += 1;
            }
        }
        leaders == 1
    })
    .await;

    assert!(elected, "cluster never converged on exactly one leader");
}

#[tokio::test]
async fn write_on_leader_replicates_to_followers() {
    let nodes = spin_up_cluster(4).await;
    let client = reqwest::Client::new();

    wait_for_condition(Duration::from_secs(5), || async {
        let mut leaders = 0;
        for node in &nodes {
            if status(&client, node).await.state == "leader" {
                leaders += 1;
            }
        }
        leaders == 1
    })
    .await;

    // node 1 has the shortest election timeout offset, so it should win.
    let leader = &nodes[0];
    assert_eq!(status(&client, leader).await.state, "leader");

    let put_resp: serde_json::Value = client
        .put(format!("{}/put_data", leader.base_url()))
        .json(&json!({"key": "foo", "value": "bar"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(put_resp["status"], "ok");

    for follower in &nodes[1..] {
        let replicated = wait_for_condition(Duration::from_secs(2), || async {
            let resp: serde_json::Value = client
                .get(format!("{}/get_data", follower.base_url()))
                .json(&json!({"key": "foo"}))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            resp["value"] == "bar"
        })
        .await;
        assert!(replicated, "follower never observed replicated value");
    }
}

#[tokio::test]
async fn write_on_follower_forwards_to_leader() {
    let nodes = spin_up_cluster(4).await;
    let client = reqwest::Client::new();

    wait_for_condition(Duration::from_secs(5), || async {
        let mut leaders = 0;
        for node in &nodes {
            if status(&client, node).await.state == "leader" {
                leaders += 1;
            }
        }
        leaders == 1
    })
    .await;

    let follower = &nodes[1];
    assert_eq!(status(&client, follower).await.state, "follower");

    let resp: serde_json::Value = client
        .put(format!("{}/put_data", follower.base_url()))
        .json(&json!({"key": "via_follower", "value": "works"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["status"], "ok");

    let replicated = wait_for_condition(Duration::from_secs(2), || async {
        let resp: serde_json::Value = client
            .get(format!("{}/get_data", nodes[0].base_url()))
            .json(&json!({"key": "via_follower"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        resp["value"] == "works"
    })
    .await;
    assert!(replicated, "forwarded write never landed on the leader");
}

#[tokio::test]
async fn update_on_missing_key_reports_error() {
    let nodes = spin_up_cluster(4).await;
    let client = reqwest::Client::new();

    wait_for_condition(Duration::from_secs(5), || async {
        let mut leaders = 0;
        for node in &nodes {
            if status(&client, node).await.state == "leader" {
                leaders += 1;
            }
        }
        leaders == 1
    })
    .await;

    let leader_index = {
        let mut found = None;
        for (i, node) in nodes.iter().enumerate() {
            if status(&client, node).await.state == "leader" {
                found = Some(i);
                break;
            }
        }
        found.expect("a leader must exist")
    };

    let resp: serde_json::Value = client
        .patch(format!("{}/update_data", nodes[leader_index].base_url()))
        .json(&json!({"key": "x", "value": "y"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["status"], "error");
    assert_eq!(resp["message"], "Key not found");
}

#[tokio::test]
async fn turnoff_then_turnon_rejoins_cluster() {
    let nodes = spin_up_cluster(4).await;
    let client = reqwest::Client::new();

    wait_for_condition(Duration::from_secs(5), || async {
        let mut leaders = 0;
        for node in &nodes {
            if status(&client, node).await.state == "leader" {
                leaders += 1;
            }
        }
        leaders == 1
    })
    .await;

    let follower = &nodes[1];
    let _: serde_json::Value = client
        .get(format!("{}/turnoff", follower.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let leader_index = {
        let mut found = None;
        for (i, node) in nodes.iter().enumerate() {
            if status(&client, node).await.state == "leader" {
                found = Some(i);
                break;
            }
        }
        found.expect("a leader must exist")
    };
    let _: serde_json::Value = client
        .put(format!("{}/put_data", nodes[leader_index].base_url()))
        .json(&json!({"key": "while_down", "value": "1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let _: serde_json::Value = client
        .get(format!("{}/turnon", follower.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let caught_up = wait_for_condition(Duration::from_secs(2), || async {
        let resp: serde_json::Value = client
            .get(format!("{}/get_data", follower.base_url()))
            .json(&json!({"key": "while_down"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        resp["value"] == "1"
    })
    .await;
    assert!(caught_up, "revived follower never caught up via heartbeat");
}
