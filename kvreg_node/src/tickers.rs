use std::time::Instant;

use kvreg_core::{ServerId, VoteRequest};
use tracing::info;

use crate::app_state::{await_alive, AppState};

/// Wakes once per second; if this node hasn't heard from a leader within its
/// id-scaled election timeout, it runs an election round (spec.md §4.2).
///
/// The lock is held only to read the timeout snapshot and again, separately,
/// to start and to commit the round — never across the sequential vote-RPC
/// fan-out, which can take up to N * rpc_timeout. Otherwise every handler
/// and the heartbeat ticker on this node would stall for the full round.
pub async fn run_election_ticker(state: AppState) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        interval.tick().await;
        await_alive(&state.node).await;

        let (server_id, should_elect, term, role, kv_len) = {
            let node = state.node.lock().await;
            let timeout = state.config.election_timeout_for(node.server_id);
            let should_elect = node.election_timeout_elapsed(Instant::now(), timeout);
            (node.server_id, should_elect, node.term, node.role, node.kv.len())
        };

        if should_elect {
            run_election_round_unlocked(&state, server_id).await;
        }

        info!(term, server_id = server_id.0, role = ?role, kv_len, "election tick");
    }
}

/// Increments the term and commits the result under brief, separate lock
/// acquisitions, but runs the sequential vote-RPC loop itself with no lock
/// held at all.
async fn run_election_round_unlocked(state: &AppState, server_id: ServerId) {
    let term = {
        let mut node = state.node.lock().await;
        node.begin_election_round()
    };

    // Self-vote is always granted; short-circuited locally instead of
    // round-tripping a vote RPC to ourselves (spec's open question
    // explicitly allows this as long as the tally comes out the same).
    let mut votes_granted = 1usize;

    for peer in state.config.peers_excluding(server_id) {
        let req = VoteRequest {
            candidate_id: server_id.0,
            term,
        };
        if let Ok(resp) = state.transport.send_vote_request(peer, req).await {
            if resp.vote_granted {
                votes_granted += 1;
            }
        }
    }

    let majority = state.config.cluster_size() / 2;
    let mut node = state.node.lock().await;
    node.apply_election_result(term, votes_granted, majority);
}

/// Wakes once per `heartbeat_interval`; if this node is leader, broadcasts
/// its term and full key/value snapshot to every other node (spec.md §4.3).
///
/// The snapshot is built and the lock released before the broadcast loop
/// runs, and re-acquired only to mark the heartbeat sent — a single slow or
/// down peer (spec.md §8 S2/S3) would otherwise stall every handler on this
/// node for up to one RPC timeout per tick.
pub async fn run_heartbeat_ticker(state: AppState) {
    let mut interval = tokio::time::interval(state.config.heartbeat_interval);
    loop {
        interval.tick().await;
        await_alive(&state.node).await;

        let (heartbeat, server_id) = {
            let node = state.node.lock().await;
            (node.build_heartbeat(), node.server_id)
        };

        if let Some(heartbeat) = heartbeat {
            for peer in state.config.peers_excluding(server_id) {
                // Sequential, like the election round: matches the source's
                // for-loop broadcast and avoids fanning out a burst of
                // concurrent outbound connections every tick.
                let _ = state.transport.send_heartbeat(peer, heartbeat.clone()).await;
            }

            let mut node = state.node.lock().await;
            node.mark_heartbeat_sent();
        }
    }
}
