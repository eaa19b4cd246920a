use axum::extract::State;
use axum::Json;
use reqwest::Method;
use serde_json::Value;

use kvreg_core::{
    ErrorResponse, GetDataResponse, HeadDataResponse, HeadStatus, HeartbeatRequest,
    HeartbeatResponse, KeyRequest, KeyValueRequest, OkResponse, ServerId, StatusResponse,
    VoteRequest, VoteResponse,
};

use crate::app_state::{await_alive, AppState};

// -- peer RPCs --

pub async fn heartbeat(
    State(state): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> Json<HeartbeatResponse> {
    await_alive(&state.node).await;
    let mut node = state.node.lock().await;
    Json(node.receive_heartbeat(req))
}

pub async fn vote(
    State(state): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> Json<VoteResponse> {
    await_alive(&state.node).await;
    let mut node = state.node.lock().await;
    Json(node.receive_vote_request(req))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let node = state.node.lock().await;
    Json(node.status())
}

// -- liveness injection --

pub async fn turnon(State(state): State<AppState>) -> Json<OkResponse> {
    let mut node = state.node.lock().await;
    node.alive = true;
    tracing::info!(term = node.term, "is alive now");
    Json(OkResponse::default())
}

pub async fn turnoff(State(state): State<AppState>) -> Json<OkResponse> {
    let mut node = state.node.lock().await;
    node.alive = false;
    tracing::info!("is dead now");
    Json(OkResponse::default())
}

// -- client data RPCs --
//
// Each of these either serves the request directly (this node is leader) or
// forwards the identical request to the current leader hint and relays
// whatever comes back (spec.md §4.4). A leader hint of `None` or a network
// failure both surface as the same in-band `{"status":"error", ...}` shape.
//
// The leader check and the local read/mutation always happen under the same
// held lock (see `Dispatch` below) — an incoming heartbeat arriving between
// a separate check-then-act pair could otherwise demote this node in
// between, leaving a local mutation applied on what is now a follower.

/// Either this node handled the request locally while it was still leader
/// (the `T` is the already-computed result), or it wasn't and the caller
/// must forward to `leader_hint` (`None` if no leader is known yet).
enum Dispatch<T> {
    Local(T),
    Forward(Option<u64>),
}

async fn forward(
    state: &AppState,
    method: Method,
    path: &str,
    leader_id: Option<u64>,
    body: &Value,
) -> Value {
    let Some(leader_id) = leader_id else {
        return serde_json::to_value(ErrorResponse::new("no leader known")).unwrap();
    };
    let Some(base_url) = state.config.roster.get(&ServerId(leader_id)) else {
        return serde_json::to_value(ErrorResponse::new(format!(
            "unknown leader id {leader_id}"
        )))
        .unwrap();
    };

    let url = format!("{base_url}{path}");
    let result = state
        .forwarding_client
        .request(method, url)
        .timeout(state.config.rpc_timeout)
        .json(body)
        .send()
        .await;

    match result {
        Ok(resp) => resp
            .json::<Value>()
            .await
            .unwrap_or_else(|e| serde_json::to_value(ErrorResponse::new(e.to_string())).unwrap()),
        Err(e) => serde_json::to_value(ErrorResponse::new(e.to_string())).unwrap(),
    }
}

pub async fn get_data(State(state): State<AppState>, Json(req): Json<KeyRequest>) -> Json<Value> {
    let dispatch = {
        let node = state.node.lock().await;
        if node.is_leader() {
            Dispatch::Local(node.get(&req.key))
        } else {
            Dispatch::Forward(node.leader_hint.map(|id| id.0))
        }
    };

    match dispatch {
        Dispatch::Local(value) => Json(
            serde_json::to_value(GetDataResponse {
                key: req.key,
                value,
            })
            .unwrap(),
        ),
        Dispatch::Forward(leader_id) => {
            let body = serde_json::to_value(&req).unwrap();
            Json(forward(&state, Method::GET, "/get_data", leader_id, &body).await)
        }
    }
}

pub async fn put_data(
    State(state): State<AppState>,
    Json(req): Json<KeyValueRequest>,
) -> Json<Value> {
    let dispatch = {
        let mut node = state.node.lock().await;
        if node.is_leader() {
            node.put(req.key.clone(), req.value.clone());
            Dispatch::Local(())
        } else {
            Dispatch::Forward(node.leader_hint.map(|id| id.0))
        }
    };

    match dispatch {
        Dispatch::Local(()) => Json(serde_json::to_value(OkResponse::default()).unwrap()),
        Dispatch::Forward(leader_id) => {
            let body = serde_json::to_value(&req).unwrap();
            Json(forward(&state, Method::PUT, "/put_data", leader_id, &body).await)
        }
    }
}

pub async fn post_data(
    State(state): State<AppState>,
    Json(req): Json<KeyValueRequest>,
) -> Json<Value> {
    let dispatch = {
        let mut node = state.node.lock().await;
        if node.is_leader() {
            node.put(req.key.clone(), req.value.clone());
            Dispatch::Local(())
        } else {
            Dispatch::Forward(node.leader_hint.map(|id| id.0))
        }
    };

    match dispatch {
        Dispatch::Local(()) => Json(serde_json::to_value(OkResponse::default()).unwrap()),
        Dispatch::Forward(leader_id) => {
            let body = serde_json::to_value(&req).unwrap();
            Json(forward(&state, Method::POST, "/post_data", leader_id, &body).await)
        }
    }
}

pub async fn delete_data(
    State(state): State<AppState>,
    Json(req): Json<KeyRequest>,
) -> Json<Value> {
    let dispatch = {
        let mut node = state.node.lock().await;
        if node.is_leader() {
            Dispatch::Local(node.delete(&req.key))
        } else {
            Dispatch::Forward(node.leader_hint.map(|id| id.0))
        }
    };

    match dispatch {
        Dispatch::Local(Ok(())) => Json(serde_json::to_value(OkResponse::default()).unwrap()),
        Dispatch::Local(Err(_)) => {
            Json(serde_json::to_value(ErrorResponse::key_not_found()).unwrap())
        }
        Dispatch::Forward(leader_id) => {
            let body = serde_json::to_value(&req).unwrap();
            Json(forward(&state, Method::DELETE, "/delete_data", leader_id, &body).await)
        }
    }
}

pub async fn head_data(
    State(state): State<AppState>,
    Json(req): Json<KeyRequest>,
) -> Json<Value> {
    let dispatch = {
        let node = state.node.lock().await;
        if node.is_leader() {
            Dispatch::Local(node.head(&req.key))
        } else {
            Dispatch::Forward(node.leader_hint.map(|id| id.0))
        }
    };

    match dispatch {
        Dispatch::Local(exists) => {
            let status = if exists {
                HeadStatus::Exists
            } else {
                HeadStatus::NotFound
            };
            Json(serde_json::to_value(HeadDataResponse { status }).unwrap())
        }
        Dispatch::Forward(leader_id) => {
            let body = serde_json::to_value(&req).unwrap();
            // The original forwards and returns the response *headers*; spec.md
            // calls that unintentional and recommends returning the body like
            // every other handler does, so that's what we do here.
            Json(forward(&state, Method::HEAD, "/head_data", leader_id, &body).await)
        }
    }
}

pub async fn update_data(
    State(state): State<AppState>,
    Json(req): Json<KeyValueRequest>,
) -> Json<Value> {
    let dispatch = {
        let mut node = state.node.lock().await;
        if node.is_leader() {
            Dispatch::Local(node.update(&req.key, req.value.clone()))
        } else {
            Dispatch::Forward(node.leader_hint.map(|id| id.0))
        }
    };

    match dispatch {
        Dispatch::Local(Ok(())) => Json(serde_json::to_value(OkResponse::default()).unwrap()),
        Dispatch::Local(Err(_)) => {
            Json(serde_json::to_value(ErrorResponse::key_not_found()).unwrap())
        }
        Dispatch::Forward(leader_id) => {
            let body = serde_json::to_value(&req).unwrap();
            Json(forward(&state, Method::PATCH, "/update_data", leader_id, &body).await)
        }
    }
}
