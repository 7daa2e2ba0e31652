// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cache Mirror
//!
//! A denormalized per-person projection of the replicated data, kept in a
//! key/field store for fast reads. The relational store is authoritative:
//! the mirror is only written after store writes and can always be rebuilt
//! from it.
//!
//! Layout: key = person token, field = `{kind}:{entity_key}`, value = the
//! entity payload as JSON.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::{Storage, StorageError};

use super::entity::{EntityKind, SyncableEntity};
use super::reconcile::PageOutcome;

/// Field name → payload JSON for one person.
pub type Projection = BTreeMap<String, String>;

/// Cache mirror errors.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for MirrorError {
    fn from(e: serde_json::Error) -> Self {
        MirrorError::Serialization(e.to_string())
    }
}

/// Projection field for an entity.
pub fn field_name(kind: EntityKind, entity_key: &str) -> String {
    format!("{}:{}", kind.as_str(), entity_key)
}

/// Key/field store holding person projections.
pub trait CacheMirror: Send + Sync {
    /// Cached projection, `None` on a miss.
    fn load(&self, owner: &str) -> Result<Option<Projection>, MirrorError>;

    /// Replaces the owner's projection in a single batch.
    fn store(&self, owner: &str, projection: &Projection) -> Result<(), MirrorError>;

    fn evict(&self, owner: &str) -> Result<(), MirrorError>;
}

/// In-process mirror for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryCacheMirror {
    entries: Mutex<HashMap<String, Projection>>,
    batches: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryCacheMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches written so far.
    pub fn batches_written(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Makes every operation fail, simulating an unreachable cache.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), MirrorError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(MirrorError::Unavailable("memory mirror set to fail".into()))
        } else {
            Ok(())
        }
    }
}

impl CacheMirror for MemoryCacheMirror {
    fn load(&self, owner: &str) -> Result<Option<Projection>, MirrorError> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(owner)
            .cloned())
    }

    fn store(&self, owner: &str, projection: &Projection) -> Result<(), MirrorError> {
        self.check()?;
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(owner.to_string(), projection.clone());
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn evict(&self, owner: &str) -> Result<(), MirrorError> {
        self.check()?;
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(owner);
        Ok(())
    }
}

/// Mirror backed by its own SQLite file.
pub struct SqliteCacheMirror {
    conn: Mutex<Connection>,
}

impl SqliteCacheMirror {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MirrorError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, MirrorError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, MirrorError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS projection_owners (
                owner TEXT PRIMARY KEY,
                stored_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS projection_fields (
                owner TEXT NOT NULL REFERENCES projection_owners(owner) ON DELETE CASCADE,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (owner, field)
            );
            PRAGMA foreign_keys = ON;",
        )?;
        Ok(SqliteCacheMirror {
            conn: Mutex::new(conn),
        })
    }
}

impl CacheMirror for SqliteCacheMirror {
    fn load(&self, owner: &str) -> Result<Option<Projection>, MirrorError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        let present = conn
            .query_row(
                "SELECT 1 FROM projection_owners WHERE owner = ?1",
                params![owner],
                |_| Ok(()),
            )
            .optional()?;
        if present.is_none() {
            return Ok(None);
        }

        let mut stmt =
            conn.prepare("SELECT field, value FROM projection_fields WHERE owner = ?1")?;
        let projection = stmt
            .query_map(params![owner], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Projection, _>>()?;
        Ok(Some(projection))
    }

    fn store(&self, owner: &str, projection: &Projection) -> Result<(), MirrorError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO projection_owners (owner, stored_at) VALUES (?1, ?2)
             ON CONFLICT (owner) DO UPDATE SET stored_at = excluded.stored_at",
            params![owner, crate::clock::current_timestamp_millis()],
        )?;
        tx.execute(
            "DELETE FROM projection_fields WHERE owner = ?1",
            params![owner],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO projection_fields (owner, field, value) VALUES (?1, ?2, ?3)",
            )?;
            for (field, value) in projection {
                insert.execute(params![owner, field, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn evict(&self, owner: &str) -> Result<(), MirrorError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "DELETE FROM projection_owners WHERE owner = ?1",
            params![owner],
        )?;
        Ok(())
    }
}

/// Keeps the mirror in step with reconciled pages.
pub struct MirrorSynchronizer<'a> {
    mirror: &'a dyn CacheMirror,
}

impl<'a> MirrorSynchronizer<'a> {
    pub fn new(mirror: &'a dyn CacheMirror) -> Self {
        MirrorSynchronizer { mirror }
    }

    /// Folds the changes of a reconciled page into the mirror.
    ///
    /// Each touched owner gets one batch write. Owners not cached yet are
    /// rebuilt from the store. Failures are logged and never returned; the
    /// owner's entry is evicted if possible and marked stale in the store so
    /// the next read rebuilds it. Returns the number of owners written.
    pub fn apply(&self, storage: &Storage, outcome: &PageOutcome) -> usize {
        let mut by_owner: BTreeMap<&str, Vec<&SyncableEntity>> = BTreeMap::new();
        for change in &outcome.changes {
            by_owner
                .entry(change.person_token.as_str())
                .or_default()
                .push(change);
        }

        let mut written = 0;
        for (owner, changes) in by_owner {
            match self.apply_owner(storage, owner, &changes) {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!(person = %owner, error = %e, "cache mirror update failed");
                    self.invalidate(storage, owner);
                }
            }
        }
        written
    }

    fn invalidate(&self, storage: &Storage, owner: &str) {
        if let Err(e) = self.mirror.evict(owner) {
            debug!(person = %owner, error = %e, "cache mirror evict failed");
        }
        let now = crate::clock::current_timestamp_millis();
        if let Err(e) = storage.mark_mirror_stale(owner, now) {
            warn!(person = %owner, error = %e, "could not mark cache mirror entry stale");
        }
    }

    fn apply_owner(
        &self,
        storage: &Storage,
        owner: &str,
        changes: &[&SyncableEntity],
    ) -> Result<(), MirrorError> {
        if changes
            .iter()
            .any(|c| c.kind().creates_owner() && c.is_tombstone())
        {
            return self.mirror.evict(owner);
        }

        let Some(mut projection) = self.mirror.load(owner)? else {
            self.rebuild(storage, owner)?;
            return Ok(());
        };

        for change in changes {
            let field = field_name(change.kind(), &change.entity_token);
            if change.is_tombstone() {
                projection.remove(&field);
            } else {
                projection.insert(field, change.payload.to_json()?);
            }
        }
        self.mirror.store(owner, &projection)
    }

    /// Recomputes an owner's projection from the store and writes it.
    pub fn rebuild(&self, storage: &Storage, owner: &str) -> Result<Projection, MirrorError> {
        let rows = storage.owner_rows(owner)?;

        let owner_gone = rows.is_empty()
            || rows
                .iter()
                .any(|r| r.kind.creates_owner() && r.deleted.is_some());
        if owner_gone {
            self.mirror.evict(owner)?;
            storage.clear_mirror_stale(owner)?;
            return Ok(Projection::new());
        }

        let projection: Projection = rows
            .into_iter()
            .filter(|r| r.deleted.is_none())
            .map(|r| (field_name(r.kind, &r.entity_key), r.payload))
            .collect();
        self.mirror.store(owner, &projection)?;
        storage.clear_mirror_stale(owner)?;
        debug!(person = %owner, fields = projection.len(), "projection rebuilt");
        Ok(projection)
    }

    /// Reads an owner's projection, rebuilding it from the store on a miss
    /// or when the cached entry is marked stale.
    pub fn projection(&self, storage: &Storage, owner: &str) -> Result<Projection, MirrorError> {
        if storage.is_mirror_stale(owner)? {
            return self.rebuild(storage, owner);
        }
        match self.mirror.load(owner)? {
            Some(projection) => Ok(projection),
            None => self.rebuild(storage, owner),
        }
    }
}
