use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use kvreg_core::{
    HeartbeatRequest, HeartbeatResponse, RaftTransport, ServerId, TransportError, VoteRequest,
    VoteResponse,
};
use tracing::trace;

/// `RaftTransport` implementation backed by a real HTTP/JSON round trip to
/// the peer's `/heartbeat` or `/vote` endpoint, with the fixed 1-second RPC
/// timeout spec.md requires for every outbound peer call.
pub struct ReqwestTransport {
    client: reqwest::Client,
    roster: HashMap<ServerId, String>,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(roster: HashMap<ServerId, String>, timeout: Duration) -> Self {
        ReqwestTransport {
            client: reqwest::Client::new(),
            roster,
            timeout,
        }
    }

    fn base_url(&self, peer: ServerId) -> Result<&str, TransportError> {
        self.roster
            .get(&peer)
            .map(String::as_str)
            .ok_or_else(|| TransportError::Unreachable(format!("unknown peer {}", peer.0)))
    }
}

#[async_trait]
impl RaftTransport for ReqwestTransport {
    async fn send_heartbeat(
        &self,
        peer: ServerId,
        request: HeartbeatRequest,
    ) -> Result<HeartbeatResponse, TransportError> {
        let url = format!("{}/heartbeat", self.base_url(peer)?);
        trace!(peer = peer.0, "sending heartbeat");
        self.client
            .post(url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?
            .json::<HeartbeatResponse>()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))
    }

    async fn send_vote_request(
        &self,
        peer: ServerId,
        request: VoteRequest,
    ) -> Result<VoteResponse, TransportError> {
        let url = format!("{}/vote", self.base_url(peer)?);
        trace!(peer = peer.0, term = request.term, "sending vote request");
        self.client
            .post(url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?
            .json::<VoteResponse>()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))
    }
}
