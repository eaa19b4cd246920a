use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A unique identifier for a server in the cluster.
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Serialize, Deserialize, Hash)]
pub struct ServerId(pub u64);

/// Whether a node currently accepts client writes or forwards them.
///
/// There is no explicit candidate state: a node running an election round
/// stays logically a follower until it observes a majority of votes, at
/// which point it transitions directly to `Leader`.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum Role {
    Follower,
    Leader,
}

impl Role {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Role::Follower => "follower",
            Role::Leader => "leader",
        }
    }
}

/// Static, fixed-at-startup description of the cluster this node is part of.
#[derive(Debug, Clone)]
pub struct RaftConfig {
    /// All server ids in the cluster, including this node, mapped to their base URL.
    pub roster: HashMap<ServerId, String>,
    /// How often a leader re-broadcasts its term and key/value snapshot.
    pub heartbeat_interval: Duration,
    /// Timeout applied to every outbound peer RPC and forwarded client RPC.
    pub rpc_timeout: Duration,
    /// Base added to the per-node election timeout offset (spec: 4s).
    pub election_timeout_base: Duration,
    /// Per-id offset added on top of the base (spec: 3s per unit of id).
    pub election_timeout_per_id: Duration,
}

impl RaftConfig {
    /// Election timeout for a given node, deterministically derived from its id
    /// so lower-id nodes bias toward starting (and winning) the first election.
    pub fn election_timeout_for(&self, server_id: ServerId) -> Duration {
        self.election_timeout_base + self.election_timeout_per_id * server_id.0 as u32
    }

    pub fn cluster_size(&self) -> usize {
        self.roster.len()
    }

    pub fn peers_excluding(&self, server_id: ServerId) -> impl Iterator<Item = ServerId> + '_ {
        self.roster.keys().copied().filter(move |id| *id != server_id)
    }
}

/// Errors that can occur when a node tries to reach a peer over the network.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// The peer did not respond within the RPC timeout, or the connection failed outright.
    Unreachable(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Unreachable(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Returned by the leader-only key/value operations when the requested key
/// is not present in the map.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct KeyNotFound;
