// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration for the sync orchestrator.

use std::time::Duration;

use crate::sync::SyncDomain;

/// Configuration passed to the orchestrator at construction.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Ignore stored cursors and request the full window every cycle.
    pub skip_cursor_check: bool,

    /// Subtracted from `data_since` on the first page of a cycle to absorb
    /// request latency and clock drift between nodes.
    pub overlap_buffer: Duration,

    /// Requested number of entities per page.
    pub page_limit: usize,

    /// Upper bound on pages fetched in a single cycle.
    pub max_pages: usize,

    /// Timeout applied to each outbound request.
    pub request_timeout: Duration,

    /// Rows per batched statement during reconciliation.
    pub batch_chunk_size: usize,

    /// Age after which a held (peer, domain) lease is considered abandoned.
    pub lease_ttl: Duration,

    /// Domains synchronized with each peer, in order.
    pub domains: Vec<SyncDomain>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            skip_cursor_check: false,
            overlap_buffer: Duration::from_secs(5),
            page_limit: 1_000,
            max_pages: 10_000,
            request_timeout: Duration::from_secs(30),
            batch_chunk_size: 1_000,
            lease_ttl: Duration::from_secs(15 * 60),
            domains: SyncDomain::ALL.to_vec(),
        }
    }
}

impl SyncConfig {
    /// Always request the full window, ignoring stored cursors.
    pub fn with_skip_cursor_check(mut self) -> Self {
        self.skip_cursor_check = true;
        self
    }

    /// Configure the first-page overlap buffer.
    ///
    /// Raise this when peers are known to drift further than the default.
    pub fn with_overlap_buffer(mut self, buffer: Duration) -> Self {
        self.overlap_buffer = buffer;
        self
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    pub fn with_batch_chunk_size(mut self, size: usize) -> Self {
        self.batch_chunk_size = size.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Restrict the cycle to the given domains.
    pub fn with_domains(mut self, domains: Vec<SyncDomain>) -> Self {
        self.domains = domains;
        self
    }

    pub(crate) fn overlap_millis(&self) -> i64 {
        self.overlap_buffer.as_millis() as i64
    }

    pub(crate) fn lease_ttl_millis(&self) -> i64 {
        self.lease_ttl.as_millis() as i64
    }
}
