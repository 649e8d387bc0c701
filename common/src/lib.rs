// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! Types and helpers shared by the codgate crates.

pub mod api;
pub mod duration;

pub mod logging {
    use std::sync::Once;
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{fmt, EnvFilter};

    static INIT: Once = Once::new();

    /// Install the global tracing subscriber. Later calls are no-ops.
    ///
    /// `RUST_LOG` overrides `default_filter`. `LOG_FORMAT=json` emits one
    /// JSON object per event instead of the human-readable format.
    pub fn init(default_filter: &str) {
        INIT.call_once(|| {
            let filter = EnvFilter::try_from_env("RUST_LOG")
                .or_else(|_| EnvFilter::try_new(default_filter))
                .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::INFO.into()));

            let json = std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false);

            let builder = fmt()
                .with_env_filter(filter)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_target(true)
                .with_line_number(true);

            // try_init: a test harness may already own the global subscriber.
            let installed = if json {
                builder.json().with_ansi(false).try_init()
            } else {
                builder.with_ansi(cfg!(unix)).try_init()
            };

            if installed.is_ok() {
                tracing::info!(json, "logging initialized");
            }
        });
    }
}
