// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Orchestrator
//!
//! Walks every outbound-eligible peer and, per peer, every configured
//! domain. Each (peer, domain) unit is isolated: it takes a lease, runs one
//! cycle, and releases the lease; a failing unit never stops the others.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::network::{LookupSource, NetworkError, PeerTransport};
use crate::storage::{Peer, Storage, SyncDirection};

use super::cycle::{CycleReport, SyncCycle};
use super::entity::SyncDomain;
use super::mirror::CacheMirror;

/// Summary of one orchestrator pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub started: i64,
    pub finished: i64,
    pub cycles: Vec<CycleReport>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.cycles.iter().filter(|c| c.is_failed()).count()
    }

    pub fn busy(&self) -> usize {
        self.cycles.iter().filter(|c| c.busy).count()
    }

    pub fn inserted(&self) -> usize {
        self.cycles.iter().map(|c| c.inserted).sum()
    }

    pub fn updated(&self) -> usize {
        self.cycles.iter().map(|c| c.updated).sum()
    }

    pub fn invalid(&self) -> usize {
        self.cycles.iter().map(|c| c.invalid).sum()
    }

    /// Report for one unit, if it ran in this pass.
    pub fn cycle(&self, network_token: &str, domain: SyncDomain) -> Option<&CycleReport> {
        self.cycles
            .iter()
            .find(|c| c.network_token == network_token && c.domain == domain)
    }
}

/// Drives sync passes for one node.
pub struct SyncOrchestrator<'a, T, L> {
    storage: &'a Storage,
    transport: T,
    lookups: L,
    mirror: &'a dyn CacheMirror,
    clock: Box<dyn Clock>,
    config: SyncConfig,
    self_token: String,
    holder: String,
}

impl<'a, T: PeerTransport, L: LookupSource> SyncOrchestrator<'a, T, L> {
    pub fn new(
        storage: &'a Storage,
        transport: T,
        lookups: L,
        mirror: &'a dyn CacheMirror,
        clock: Box<dyn Clock>,
        config: SyncConfig,
        self_token: &str,
    ) -> Self {
        SyncOrchestrator {
            storage,
            transport,
            lookups,
            mirror,
            clock,
            config,
            self_token: self_token.to_string(),
            holder: Uuid::new_v4().to_string(),
        }
    }

    /// Lease holder id of this orchestrator.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn lookups(&self) -> &L {
        &self.lookups
    }

    /// Runs one pass over every eligible peer and configured domain.
    ///
    /// Only a failure to list peers is returned as an error; everything
    /// else is reported per unit.
    pub async fn run_once(&self) -> SyncResult<RunReport> {
        let mut report = RunReport {
            started: self.clock.now_millis(),
            ..RunReport::default()
        };

        let peers = self.storage.eligible_peers(SyncDirection::Outbound)?;
        debug!(peers = peers.len(), "starting sync pass");

        for peer in &peers {
            for &domain in &self.config.domains {
                report.cycles.push(self.run_unit(peer, domain).await);
            }
        }

        report.finished = self.clock.now_millis();
        info!(
            cycles = report.cycles.len(),
            failed = report.failed(),
            inserted = report.inserted(),
            updated = report.updated(),
            invalid = report.invalid(),
            "sync pass complete"
        );
        Ok(report)
    }

    async fn run_unit(&self, peer: &Peer, domain: SyncDomain) -> CycleReport {
        let mut report = CycleReport::new(peer, domain);

        let secret = match self.storage.active_secret_to(peer) {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                let err = NetworkError::MissingCredentials(peer.network_token.clone());
                warn!(network = %peer.network_token, domain = %domain, "no active secret, skipping");
                report.error = Some(err.to_string());
                return report;
            }
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        };

        let acquired = self.storage.try_acquire_lease(
            peer.id,
            domain,
            &self.holder,
            self.clock.now_millis(),
            self.config.lease_ttl_millis(),
        );
        match acquired {
            Ok(true) => {}
            Ok(false) => {
                debug!(network = %peer.network_token, domain = %domain, "lease held elsewhere, skipping");
                report.busy = true;
                return report;
            }
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        }

        let cycle = SyncCycle::new(
            self.storage,
            &self.transport,
            &self.lookups,
            self.mirror,
            self.clock.as_ref(),
            &self.config,
            &self.self_token,
        )
        .with_lease_holder(&self.holder);
        let report = cycle.run(peer, domain, &secret).await;

        if let Err(e) = self.storage.release_lease(peer.id, domain, &self.holder) {
            warn!(network = %peer.network_token, domain = %domain, error = %e, "lease release failed");
        }
        report
    }
}
