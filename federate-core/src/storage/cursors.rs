// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync cursor storage.
//!
//! One row per (peer, domain) holding the local clock at the start of the
//! last fully successful cycle.

use rusqlite::{params, OptionalExtension};

use super::{Storage, StorageError};
use crate::sync::SyncDomain;

/// Watermark of the last successful cycle for a (peer, domain) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCursor {
    pub network_id: i64,
    pub domain: SyncDomain,
    pub last_synchronized: i64,
    pub updated: i64,
}

impl Storage {
    /// Loads the cursor for a (peer, domain) pair.
    pub fn cursor(
        &self,
        network_id: i64,
        domain: SyncDomain,
    ) -> Result<Option<SyncCursor>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT last_synchronized, updated FROM sync_cursors
                 WHERE network_id = ?1 AND sync_domain = ?2",
                params![network_id, domain.as_str()],
                |row| {
                    Ok(SyncCursor {
                        network_id,
                        domain,
                        last_synchronized: row.get(0)?,
                        updated: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    /// Moves the cursor to `watermark`.
    ///
    /// Creates the row on the first successful cycle. A single statement,
    /// so the cursor is either fully written or untouched. The cursor never
    /// moves backwards: returns false, leaving the row alone, when a newer
    /// watermark is already stored.
    pub fn advance_cursor(
        &self,
        network_id: i64,
        domain: SyncDomain,
        watermark: i64,
        now: i64,
    ) -> Result<bool, StorageError> {
        let rows = self.conn.execute(
            "INSERT INTO sync_cursors (network_id, sync_domain, last_synchronized, updated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (network_id, sync_domain)
             DO UPDATE SET last_synchronized = excluded.last_synchronized, updated = excluded.updated
             WHERE excluded.last_synchronized >= sync_cursors.last_synchronized",
            params![network_id, domain.as_str(), watermark, now],
        )?;
        Ok(rows == 1)
    }
}
