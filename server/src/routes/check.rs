// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use codgate_common::api::{CheckResp, GateReq};

use super::{parse_body, request_identity, with_cookie};
use crate::error::GateError;
use crate::AppState;

/// `POST /check`: is this visitor currently blocked?
pub async fn handle(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GateError> {
    let req: GateReq = parse_body(&body)?;
    let who = request_identity(&state, connect_info, &headers, &req)?;

    let status = state.gate.check(&who.identity).await?;
    let resp = if status.blocked {
        CheckResp {
            blocked: true,
            remaining_seconds: status.remaining_seconds,
            hit: status.matched.map(|key| key.to_string()),
        }
    } else {
        CheckResp::not_blocked()
    };
    Ok(with_cookie(Json(resp), who.set_cookie))
}
