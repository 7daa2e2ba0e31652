// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per (peer, domain) leases.
//!
//! Serializes overlapping orchestrator runs for the same pair. A lease that
//! was never released (crashed run) becomes stale after its TTL and can be
//! taken over.

use rusqlite::params;

use super::{Storage, StorageError};
use crate::sync::SyncDomain;

impl Storage {
    /// Tries to take the lease for a (peer, domain) pair.
    ///
    /// Succeeds when no lease exists, when the lease is already held by
    /// `holder`, or when the existing lease was acquired before
    /// `now - ttl_millis`.
    pub fn try_acquire_lease(
        &self,
        network_id: i64,
        domain: SyncDomain,
        holder: &str,
        now: i64,
        ttl_millis: i64,
    ) -> Result<bool, StorageError> {
        let stale_before = now.saturating_sub(ttl_millis);
        let rows = self.conn.execute(
            "INSERT INTO sync_leases (network_id, sync_domain, holder, acquired_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (network_id, sync_domain) DO UPDATE
             SET holder = excluded.holder, acquired_at = excluded.acquired_at
             WHERE sync_leases.holder = excluded.holder OR sync_leases.acquired_at < ?5",
            params![network_id, domain.as_str(), holder, now, stale_before],
        )?;
        Ok(rows == 1)
    }

    /// Returns true while `holder` still owns the lease.
    pub fn holds_lease(
        &self,
        network_id: i64,
        domain: SyncDomain,
        holder: &str,
    ) -> Result<bool, StorageError> {
        let held: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM sync_leases
                            WHERE network_id = ?1 AND sync_domain = ?2 AND holder = ?3)",
            params![network_id, domain.as_str(), holder],
            |row| row.get(0),
        )?;
        Ok(held)
    }

    /// Releases a lease held by `holder`. Leases held by others are left alone.
    pub fn release_lease(
        &self,
        network_id: i64,
        domain: SyncDomain,
        holder: &str,
    ) -> Result<bool, StorageError> {
        let rows = self.conn.execute(
            "DELETE FROM sync_leases WHERE network_id = ?1 AND sync_domain = ?2 AND holder = ?3",
            params![network_id, domain.as_str(), holder],
        )?;
        Ok(rows > 0)
    }
}
