use crate::common::{ServerId, TransportError};
use crate::rpc_messages::{HeartbeatRequest, HeartbeatResponse, VoteRequest, VoteResponse};
use async_trait::async_trait;

/// Abstracts the outbound side of peer RPCs so the election/heartbeat logic
/// in this crate can be unit tested without a real HTTP stack, and so the
/// node binary can swap in a `reqwest`-backed implementation.
///
/// Mirrors the role the teacher's `RaftTransportBridge` trait plays for the
/// gRPC transport, minus the request/reply queueing: here each call is a
/// plain async round trip, since the node binary issues peer RPCs directly
/// rather than funneling them through a separate consensus thread.
#[async_trait]
pub trait RaftTransport: Send + Sync {
    async fn send_heartbeat(
        &self,
        peer: ServerId,
        request: HeartbeatRequest,
    ) -> Result<HeartbeatResponse, TransportError>;

    async fn send_vote_request(
        &self,
        peer: ServerId,
        request: VoteRequest,
    ) -> Result<VoteResponse, TransportError>;
}
