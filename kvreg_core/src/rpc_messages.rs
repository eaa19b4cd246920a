use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Incoming from a claimed leader: `POST /heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub leader_id: u64,
    pub term: u64,
    pub change_log: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
    Ok,
    Bad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub status: HeartbeatStatus,
}

/// Incoming vote request from a candidate: `POST /vote`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: u64,
    pub term: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteResponse {
    pub vote_granted: bool,
}

/// `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: String,
    pub leader_id: Option<u64>,
    pub term: u64,
}

/// Body shared by `get_data`, `delete_data` and `head_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRequest {
    pub key: String,
}

/// Body shared by `put_data`, `post_data` and `update_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValueRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDataResponse {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub status: &'static str,
}

impl Default for OkResponse {
    fn default() -> Self {
        OkResponse { status: "ok" }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorResponse {
            status: "error",
            message: message.into(),
        }
    }

    pub fn key_not_found() -> Self {
        ErrorResponse::new("Key not found")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HeadStatus {
    Exists,
    #[serde(rename = "not found")]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadDataResponse {
    pub status: HeadStatus,
}
