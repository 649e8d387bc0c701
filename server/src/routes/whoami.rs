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
use codgate_common::api::{GateReq, WhoamiResp};

use super::{parse_body, request_identity, with_cookie};
use crate::error::GateError;
use crate::AppState;

/// `POST /whoami`: the identity the gate would use for this request.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GateError> {
    let req: GateReq = parse_body(&body)?;
    let who = request_identity(&state, connect_info, &headers, &req)?;

    let resp = WhoamiResp {
        ip: who.identity.ip.map(|ip| ip.to_string()),
        cid: who.identity.cookie_id,
        fingerprint: who.identity.fingerprint,
    };
    Ok(with_cookie(Json(resp), who.set_cookie))
}
