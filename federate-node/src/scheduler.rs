// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Scheduler
//!
//! Runs orchestrator passes on a dedicated thread with a current-thread
//! runtime and its own store connection, pausing `sync_interval` between
//! passes. A failed pass is logged and the next one runs on schedule.

use std::thread::{self, JoinHandle};

use tracing::{error, info};

use federate_core::network::{HttpLookupSource, HttpPeerTransport, HttpTransportConfig};
use federate_core::{
    CacheMirror, LookupSource, PeerTransport, RunReport, SqliteCacheMirror, Storage, SyncError,
    SyncOrchestrator, SyncResult, SystemClock,
};

use crate::config::NodeConfig;

/// Orchestrator wired to the HTTP transport and the optional lookup catalog.
pub type HttpOrchestrator<'a> = SyncOrchestrator<'a, HttpPeerTransport, Option<HttpLookupSource>>;

/// Builds the production orchestrator over `storage` and `mirror`.
pub fn build_orchestrator<'a>(
    storage: &'a Storage,
    mirror: &'a dyn CacheMirror,
    config: &NodeConfig,
) -> SyncResult<HttpOrchestrator<'a>> {
    let http = HttpTransportConfig::default().with_timeout(config.sync.request_timeout);
    let transport = HttpPeerTransport::new(&http)?;
    let lookups = config
        .lookup_url
        .as_deref()
        .map(|url| HttpLookupSource::new(url, &http))
        .transpose()?;

    Ok(SyncOrchestrator::new(
        storage,
        transport,
        lookups,
        mirror,
        Box::new(SystemClock),
        config.sync.clone(),
        &config.network_token,
    ))
}

/// Runs one pass, logging instead of returning a failure.
pub async fn run_pass<T: PeerTransport, L: LookupSource>(
    orchestrator: &SyncOrchestrator<'_, T, L>,
) -> Option<RunReport> {
    match orchestrator.run_once().await {
        Ok(report) => Some(report),
        Err(e) => {
            error!(error = %e, "Sync pass failed");
            None
        }
    }
}

/// Opens the scheduler's own connections and loops forever.
pub async fn run_forever(config: NodeConfig) -> SyncResult<()> {
    let storage = Storage::open(config.database_path())?;
    let mirror = SqliteCacheMirror::open(config.cache_path())?;
    let orchestrator = build_orchestrator(&storage, &mirror, &config)?;

    info!(
        holder = orchestrator.holder(),
        interval_secs = config.sync_interval.as_secs(),
        lookups = config.lookup_url.is_some(),
        "Sync scheduler started"
    );

    loop {
        run_pass(&orchestrator).await;
        tokio::time::sleep(config.sync_interval).await;
    }
}

/// Spawns the scheduler thread.
pub fn spawn(config: NodeConfig) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("federate-sync".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(error = %e, "Failed to build scheduler runtime");
                    return;
                }
            };

            let result: Result<(), SyncError> = runtime.block_on(run_forever(config));
            if let Err(e) = result {
                error!(error = %e, "Sync scheduler stopped");
            }
        })
}
