// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Owners whose cache mirror entry can no longer be trusted.
//!
//! A failed mirror write leaves the cached projection behind the store. The
//! owner is marked here so the next read rebuilds it instead of serving the
//! old entry.

use rusqlite::params;

use super::{Storage, StorageError};

impl Storage {
    /// Marks an owner's mirror entry as stale. Re-marking keeps the first mark.
    pub fn mark_mirror_stale(&self, owner: &str, now: i64) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO mirror_stale_owners (owner, marked_at) VALUES (?1, ?2)
             ON CONFLICT (owner) DO NOTHING",
            params![owner, now],
        )?;
        Ok(())
    }

    pub fn is_mirror_stale(&self, owner: &str) -> Result<bool, StorageError> {
        let stale: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM mirror_stale_owners WHERE owner = ?1)",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(stale)
    }

    /// Clears the mark once the entry has been rebuilt.
    pub fn clear_mirror_stale(&self, owner: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM mirror_stale_owners WHERE owner = ?1",
            params![owner],
        )?;
        Ok(())
    }
}
