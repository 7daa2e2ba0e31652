// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persistent Storage Module
//!
//! The local relational store: peers and their secrets, sync cursors and
//! leases, lookup definitions, and the replicated person entities.
//! Uses SQLite through a single connection per `Storage`.

mod cursors;
mod entities;
mod error;
mod leases;
mod lookups;
mod mirror_state;
pub mod migration;
mod peers;

pub use cursors::SyncCursor;
pub use entities::{EntityRow, LocalState, OwnerRef, RowWrite};
pub use error::StorageError;
pub use lookups::{LookupDefinition, LookupKey, LookupKind};
pub use peers::{NewPeer, Peer, PeerFlags, SecretDirection, SyncDirection};

use rusqlite::Connection;
use std::path::Path;

/// SQLite-based storage implementation.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Creates an in-memory storage (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let storage = Storage { conn };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Runs all pending schema migrations.
    fn run_migrations(&self) -> Result<(), StorageError> {
        let migrations = migration::all_migrations();
        migration::MigrationRunner::run(&self.conn, &migrations)
    }

    /// Returns the current schema version.
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        migration::MigrationRunner::current_version(&self.conn)
    }
}
