// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use codgate_common::duration::format_duration;
use codgate_crypto::TokenCodec;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{AuthMode, Config};
use crate::gate::BlockGate;
use crate::identity::IdentityResolver;
use crate::routes;
use crate::{AppState, Auth};

pub struct Application {
    port: u16,
    listener: TcpListener,
    app: Router,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        info!("starting codgate: {}", config.summary());

        let state = build_state(&config).await?;
        let app = build_router(&config, state)?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
        let port = listener.local_addr()?.port();

        info!("server ready at {}", config.bind_addr);
        Ok(Self { port, listener, app })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run(self) -> Result<()> {
        axum::serve(
            self.listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
    }
}

/// Opens the configured store and wires the gate, resolver and auth mode.
pub async fn build_state(config: &Config) -> Result<Arc<AppState>> {
    let store = config
        .store
        .clone()
        .build()
        .await
        .context("Failed to initialize block store")?;
    let gate = BlockGate::new(store, config.block_ttl);
    info!(
        backend = gate.backend_name(),
        ttl = %format_duration(gate.ttl()),
        "block store ready"
    );

    let auth = match &config.auth {
        AuthMode::Cookie => Auth::Cookie,
        AuthMode::Token { secret, max_age } => {
            let codec = match max_age {
                Some(max_age) => TokenCodec::new(secret).with_max_age(*max_age),
                None => TokenCodec::new(secret),
            };
            match codec.max_age() {
                Some(max_age) => info!(max_age = %format_duration(max_age), "token auth enabled"),
                None => info!("token auth enabled; tokens do not expire"),
            }
            Auth::Token(codec)
        }
    };

    Ok(Arc::new(AppState::new(
        Arc::new(gate),
        IdentityResolver::new(config.behind_proxy),
        auth,
        config.cookie.clone(),
    )))
}

/// Routes plus the CORS and request-tracing layers.
pub fn build_router(config: &Config, state: Arc<AppState>) -> Result<Router> {
    let cors = config.cors.layer()?;
    Ok(routes::router(state, config.enable_whoami)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!("failed to listen for shutdown signal: {e}"),
    }
}
