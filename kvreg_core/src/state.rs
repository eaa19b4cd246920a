use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, trace};

use crate::common::{KeyNotFound, RaftConfig, Role, ServerId};
use crate::rpc_messages::{
    HeartbeatRequest, HeartbeatResponse, HeartbeatStatus, StatusResponse, VoteRequest,
    VoteResponse,
};
use crate::transport::RaftTransport;

/// The full in-memory record backing a single node. Everything the election
/// ticker, the heartbeat ticker and the request handlers read or mutate
/// lives here; callers are expected to hold this behind a single mutex
/// (`tokio::sync::Mutex<NodeState>`) so that a heartbeat's several field
/// updates (role, term, leader hint, map, timestamp) appear atomic to any
/// concurrent reader, per the concurrency model this register follows.
#[derive(Debug)]
pub struct NodeState {
    pub server_id: ServerId,
    pub role: Role,
    pub term: u64,
    pub leader_hint: Option<ServerId>,
    /// One vote granted per term, at most.
    votes_by_term: HashMap<u64, ServerId>,
    pub kv: HashMap<String, String>,
    pub last_heartbeat: Instant,
    pub alive: bool,
}

impl NodeState {
    pub fn new(server_id: ServerId) -> Self {
        NodeState {
            server_id,
            role: Role::Follower,
            term: 0,
            leader_hint: None,
            votes_by_term: HashMap::new(),
            kv: HashMap::new(),
            last_heartbeat: Instant::now(),
            alive: true,
        }
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            state: self.role.as_wire_str().to_string(),
            leader_id: self.leader_hint.map(|id| id.0),
            term: self.term,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    // -- client data operations (caller must only invoke these while leader) --

    pub fn get(&self, key: &str) -> Option<String> {
        self.kv.get(key).cloned()
    }

    pub fn put(&mut self, key: String, value: String) {
        self.kv.insert(key, value);
    }

    pub fn delete(&mut self, key: &str) -> Result<(), KeyNotFound> {
        if self.kv.remove(key).is_some() {
            Ok(())
        } else {
            Err(KeyNotFound)
        }
    }

    pub fn head(&self, key: &str) -> bool {
        self.kv.contains_key(key)
    }

    pub fn update(&mut self, key: &str, value: String) -> Result<(), KeyNotFound> {
        if let Some(slot) = self.kv.get_mut(key) {
            *slot = value;
            Ok(())
        } else {
            Err(KeyNotFound)
        }
    }

    // -- peer RPC handlers --

    /// Incoming heartbeat from a claimed leader (spec §4.4).
    ///
    /// A tied term (`self.term == term`) still demotes and overwrites: only
    /// one node can hold a given term's leadership (vote uniqueness enforces
    /// that), so the sender is treated as authoritative for that term.
    pub fn receive_heartbeat(&mut self, req: HeartbeatRequest) -> HeartbeatResponse {
        if self.term > req.term {
            return HeartbeatResponse {
                status: HeartbeatStatus::Bad,
            };
        }

        self.role = Role::Follower;
        self.term = req.term;
        self.last_heartbeat = Instant::now();
        self.leader_hint = Some(ServerId(req.leader_id));
        self.kv = req.change_log;

        trace!(
            server_id = self.server_id.0,
            term = self.term,
            leader_id = req.leader_id,
            "accepted heartbeat"
        );

        HeartbeatResponse {
            status: HeartbeatStatus::Ok,
        }
    }

    /// Incoming vote request from a candidate (spec §4.4).
    pub fn receive_vote_request(&mut self, req: VoteRequest) -> VoteResponse {
        if req.term > self.term {
            self.term = req.term;
        }

        if req.candidate_id == self.server_id.0 {
            return VoteResponse { vote_granted: true };
        }

        if self.role != Role::Follower {
            return VoteResponse {
                vote_granted: false,
            };
        }

        if self.votes_by_term.contains_key(&req.term) {
            return VoteResponse {
                vote_granted: false,
            };
        }

        self.votes_by_term.insert(req.term, ServerId(req.candidate_id));
        self.last_heartbeat = Instant::now();

        info!(
            server_id = self.server_id.0,
            candidate_id = req.candidate_id,
            term = req.term,
            "granted vote"
        );

        VoteResponse { vote_granted: true }
    }

    // -- background tickers --

    /// Whether this node should run an election round right now.
    pub fn election_timeout_elapsed(&self, now: Instant, timeout: std::time::Duration) -> bool {
        self.role != Role::Leader && now.duration_since(self.last_heartbeat) > timeout
    }

    /// Starts one election round: increments the term and returns it. The
    /// caller collects votes (see `apply_election_result`) without needing
    /// to hold any lock guarding this node for the duration of that RPC
    /// fan-out — only this step and the commit step touch `&mut self`.
    pub fn begin_election_round(&mut self) -> u64 {
        self.term += 1;
        info!(server_id = self.server_id.0, term = self.term, "starting election round");
        self.term
    }

    /// Commits the outcome of the round started by `begin_election_round`.
    /// If `self.term` has since moved on (a heartbeat or vote request from
    /// another node arrived while this round's vote RPCs were in flight),
    /// the round is abandoned — whoever advanced the term already refreshed
    /// `last_heartbeat`, so there's nothing stale left to apply here.
    /// Otherwise transitions to leader on a strict majority and refreshes
    /// `last_heartbeat` regardless, so a lost election doesn't immediately
    /// retrigger.
    pub fn apply_election_result(&mut self, term: u64, votes_granted: usize, majority: usize) {
        if self.term != term {
            return;
        }

        if votes_granted > majority {
            self.role = Role::Leader;
            self.leader_hint = Some(self.server_id);
            info!(
                server_id = self.server_id.0,
                term, votes_granted, "won election, becoming leader"
            );
        }

        self.last_heartbeat = Instant::now();
    }

    /// Runs one election round end to end: increments the term, collects
    /// votes from every peer sequentially (spec §5 — not fanned out
    /// concurrently, total wall clock bounded by N * rpc_timeout), and
    /// commits the result. Convenience wrapper over
    /// `begin_election_round`/`apply_election_result` for callers (tests,
    /// chiefly) that own the `NodeState` directly rather than behind a
    /// shared lock; `kvreg_node`'s ticker calls the two steps separately so
    /// it can release its mutex guard across the RPC fan-out.
    pub async fn run_election_round(&mut self, config: &RaftConfig, transport: &dyn RaftTransport) {
        let term = self.begin_election_round();

        // Self-vote is always granted; short-circuited locally instead of
        // round-tripping a vote RPC to ourselves (spec's open question
        // explicitly allows this as long as the tally comes out the same).
        let mut votes_granted = 1usize;

        for peer in config.peers_excluding(self.server_id) {
            let req = crate::rpc_messages::VoteRequest {
                candidate_id: self.server_id.0,
                term,
            };
            match transport.send_vote_request(peer, req).await {
                Ok(resp) if resp.vote_granted => votes_granted += 1,
                Ok(_) => {}
                Err(err) => {
                    trace!(peer = peer.0, error = %err, "vote request failed, counted as no vote");
                }
            }
        }

        let majority = config.cluster_size() / 2;
        self.apply_election_result(term, votes_granted, majority);
    }

    /// Builds the snapshot a leader broadcasts this tick, or `None` if this
    /// node isn't currently leader (the heartbeat ticker does nothing then).
    pub fn build_heartbeat(&self) -> Option<HeartbeatRequest> {
        if !self.is_leader() {
            return None;
        }
        Some(HeartbeatRequest {
            leader_id: self.server_id.0,
            term: self.term,
            change_log: self.kv.clone(),
        })
    }

    pub fn mark_heartbeat_sent(&mut self) {
        self.last_heartbeat = Instant::now();
    }
}
