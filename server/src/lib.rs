// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! Checkout gate server.
//!
//! A storefront asks `POST /check` before showing cash-on-delivery and calls
//! `POST /mark` when a visitor should be refused for a while. Blocks are
//! keyed by client IP, a first-party cookie identifier and an optional
//! device fingerprint; any one live key blocks the visitor.

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod routes;
pub mod startup;
pub mod store;

use std::sync::Arc;

use codgate_crypto::TokenCodec;

use crate::config::CookieConfig;
use crate::gate::BlockGate;
use crate::identity::IdentityResolver;

/// Request authentication, resolved once from [`config::AuthMode`].
pub enum Auth {
    Cookie,
    Token(TokenCodec),
}

pub struct AppState {
    pub gate: Arc<BlockGate>,
    pub resolver: IdentityResolver,
    pub auth: Auth,
    pub cookie: CookieConfig,
}

impl AppState {
    pub fn new(gate: Arc<BlockGate>, resolver: IdentityResolver, auth: Auth, cookie: CookieConfig) -> Self {
        Self {
            gate,
            resolver,
            auth,
            cookie,
        }
    }

    pub fn token_codec(&self) -> Option<&TokenCodec> {
        match &self.auth {
            Auth::Token(codec) => Some(codec),
            Auth::Cookie => None,
        }
    }
}
