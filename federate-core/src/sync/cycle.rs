// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Cycle
//!
//! One pull of one domain from one peer: page through the peer's changes
//! since the stored cursor, reconcile each page, refresh the mirror, and
//! advance the cursor only when the whole cycle was clean.

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::network::{LookupSource, NetworkError, PageRequest, PeerTransport};
use crate::storage::{Peer, Storage};

use super::entity::SyncDomain;
use super::mirror::{CacheMirror, MirrorSynchronizer};
use super::reconcile::{PageOutcome, ReconciliationEngine};

/// Result of one (peer, domain) unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub network_id: i64,
    pub network_token: String,
    pub domain: SyncDomain,
    pub pages: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub invalid: usize,
    /// The cursor was moved to the cycle start.
    pub advanced: bool,
    /// Another run held the lease; nothing was fetched.
    pub busy: bool,
    pub error: Option<String>,
}

impl CycleReport {
    pub fn new(peer: &Peer, domain: SyncDomain) -> Self {
        CycleReport {
            network_id: peer.id,
            network_token: peer.network_token.clone(),
            domain,
            pages: 0,
            inserted: 0,
            updated: 0,
            skipped: 0,
            invalid: 0,
            advanced: false,
            busy: false,
            error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    fn absorb(&mut self, outcome: &PageOutcome) {
        self.inserted += outcome.inserted;
        self.updated += outcome.updated;
        self.skipped += outcome.skipped;
        self.invalid += outcome.invalid_count();
    }
}

/// Runs cycles against one store with one transport.
pub struct SyncCycle<'a, T, L> {
    storage: &'a Storage,
    transport: &'a T,
    lookups: &'a L,
    mirror: MirrorSynchronizer<'a>,
    engine: ReconciliationEngine,
    clock: &'a dyn Clock,
    config: &'a SyncConfig,
    self_token: &'a str,
    lease_holder: Option<&'a str>,
}

impl<'a, T: PeerTransport, L: LookupSource> SyncCycle<'a, T, L> {
    pub fn new(
        storage: &'a Storage,
        transport: &'a T,
        lookups: &'a L,
        mirror: &'a dyn CacheMirror,
        clock: &'a dyn Clock,
        config: &'a SyncConfig,
        self_token: &'a str,
    ) -> Self {
        SyncCycle {
            storage,
            transport,
            lookups,
            mirror: MirrorSynchronizer::new(mirror),
            engine: ReconciliationEngine::new(config.batch_chunk_size),
            clock,
            config,
            self_token,
            lease_holder: None,
        }
    }

    /// Only advance the cursor while `holder` still owns the (peer, domain)
    /// lease.
    pub fn with_lease_holder(mut self, holder: &'a str) -> Self {
        self.lease_holder = Some(holder);
        self
    }

    /// Pulls `domain` from `peer` using `secret` as this node's credential.
    ///
    /// Never returns an error: failures are recorded in the report and leave
    /// the cursor where it was.
    pub async fn run(&self, peer: &Peer, domain: SyncDomain, secret: &str) -> CycleReport {
        let cycle_start = self.clock.now_millis();
        let mut report = CycleReport::new(peer, domain);

        if let Err(e) = self.pull(peer, domain, secret, cycle_start, &mut report).await {
            warn!(
                network = %peer.network_token,
                domain = %domain,
                pages = report.pages,
                error = %e,
                "sync cycle failed, cursor not advanced"
            );
            report.error = Some(e.to_string());
            return report;
        }

        if report.invalid > 0 {
            warn!(
                network = %peer.network_token,
                domain = %domain,
                invalid = report.invalid,
                "invalid entities received, cursor not advanced"
            );
            return report;
        }

        if let Some(holder) = self.lease_holder {
            match self.storage.holds_lease(peer.id, domain, holder) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(network = %peer.network_token, domain = %domain, "lease lost, cursor not advanced");
                    report.error = Some(format!(
                        "lease for {}/{} lost before cursor advance",
                        peer.network_token, domain
                    ));
                    return report;
                }
                Err(e) => {
                    report.error = Some(e.to_string());
                    return report;
                }
            }
        }

        match self
            .storage
            .advance_cursor(peer.id, domain, cycle_start, self.clock.now_millis())
        {
            Ok(true) => report.advanced = true,
            Ok(false) => {
                debug!(network = %peer.network_token, domain = %domain, "newer cursor already stored");
            }
            Err(e) => {
                warn!(network = %peer.network_token, domain = %domain, error = %e, "cursor write failed");
                report.error = Some(e.to_string());
            }
        }

        info!(
            network = %peer.network_token,
            domain = %domain,
            pages = report.pages,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            "sync cycle complete"
        );
        report
    }

    async fn pull(
        &self,
        peer: &Peer,
        domain: SyncDomain,
        secret: &str,
        cycle_start: i64,
        report: &mut CycleReport,
    ) -> SyncResult<()> {
        let cursor = if self.config.skip_cursor_check {
            None
        } else {
            self.storage.cursor(peer.id, domain)?
        };
        let data_since = cursor
            .map(|c| c.last_synchronized.saturating_sub(self.config.overlap_millis()).max(0));

        let limit = self.config.page_limit;
        let mut request =
            PageRequest::first(self.self_token, secret, data_since, cycle_start, limit);
        let mut window = data_since;
        let mut last_token: Option<i64> = None;

        loop {
            if report.pages >= self.config.max_pages {
                return Err(NetworkError::Protocol(format!(
                    "more than {} pages in one cycle",
                    self.config.max_pages
                ))
                .into());
            }

            let page = self.transport.fetch_page(peer, domain, &request).await?;
            report.pages += 1;
            if request.is_first() {
                window = page.prev_data_since.or(data_since);
            }

            let outcome = self
                .engine
                .reconcile_page(
                    self.storage,
                    domain,
                    peer.id,
                    &page.items,
                    self.lookups,
                    self.clock.now_millis(),
                )
                .await?;
            report.absorb(&outcome);
            self.mirror.apply(self.storage, &outcome);

            let Some(token) = page.pagination_updated else {
                break;
            };
            if page.items.len() < limit {
                break;
            }
            if last_token.is_some_and(|last| token <= last) {
                return Err(NetworkError::Protocol(format!(
                    "continuation token {} did not advance",
                    token
                ))
                .into());
            }
            last_token = Some(token);
            request = request.next(window, token, self.clock.now_millis());
        }

        Ok(())
    }
}
