// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

use anyhow::Result;
use codgate_common::logging;
use codgate_server::{config::Config, startup::Application};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info,codgate_server=info,tower_http=info");

    let config = Config::from_env()?;
    let app = Application::build(config).await?;
    app.run().await
}
