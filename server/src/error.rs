// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use codgate_common::api::ErrorResp;
use codgate_crypto::TokenError;
use thiserror::Error;
use tracing::{error, warn};

/// Request-level failures of the gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// `issue` called with a missing, short or malformed subject.
    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    /// No ip, cookie id or fingerprint survived validation. Check and mark
    /// answer this with "not blocked" / "nothing marked".
    #[error("request carries no usable identity")]
    MissingIdentity,

    /// A token was supplied but does not verify for the claimed identity.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("block store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::InvalidSubject(_) | GateError::BadRequest(_) | GateError::MissingIdentity => {
                StatusCode::BAD_REQUEST
            }
            GateError::AuthenticationFailed => StatusCode::FORBIDDEN,
            GateError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for GateError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InvalidSubject(reason) => GateError::InvalidSubject(reason.to_string()),
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            GateError::StoreUnavailable(e) => {
                error!("store error: {e:#}");
                "store unavailable".to_string()
            }
            GateError::AuthenticationFailed => {
                warn!("rejected request with invalid token");
                self.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResp::new(message))).into_response()
    }
}
