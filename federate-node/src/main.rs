// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Federate Node Server
//!
//! Serves sync pages to authenticated peers and pulls from them on a
//! schedule. Configured through `FEDERATE_*` environment variables.

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::net::TcpListener;
use tracing::info;

use federate_core::Storage;
use federate_node::config::NodeConfig;
use federate_node::ensure_self_peer;
use federate_node::http::{create_router, HttpState};
use federate_node::scheduler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("federate_node=info".parse()?)
                .add_directive("federate_core=info".parse()?),
        )
        .init();

    // Load configuration
    let config = NodeConfig::from_env()?;
    info!(
        "Starting Federate Node v{} as {}",
        env!("CARGO_PKG_VERSION"),
        config.network_token
    );
    info!("HTTP: {}", config.listen_addr);
    info!("Data directory: {}", config.data_dir.display());

    std::fs::create_dir_all(&config.data_dir)?;
    let storage = Storage::open(config.database_path())?;
    ensure_self_peer(&storage, &config.network_token, &config.public_url)?;

    // The scheduler opens its own connections.
    scheduler::spawn(config.clone())?;

    let state = HttpState {
        storage: Arc::new(Mutex::new(storage)),
        start_time: Instant::now(),
        max_page_limit: config.max_page_limit,
    };
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
