// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Database Schema Migration Framework
//!
//! Versioned schema migrations with transactional safety.
//! Each migration has a version number, name, and either SQL or a Rust callback.
//! The runner tracks applied versions in a `schema_version` table and runs
//! pending migrations in order within a single transaction.

use rusqlite::Connection;

use super::StorageError;
use crate::sync::EntityKind;

/// A single schema migration step.
pub struct Migration {
    /// Monotonically increasing version number (starting at 1).
    pub version: u32,
    /// Human-readable name for this migration.
    pub name: &'static str,
    /// The migration action: either SQL or a Rust callback.
    pub action: MigrationAction,
}

/// The action a migration performs.
pub enum MigrationAction {
    /// Pure SQL migration.
    Sql(&'static str),
    /// Rust callback migration (for DDL generated from code).
    Callback(fn(&Connection) -> Result<(), StorageError>),
}

/// Runs schema migrations against a database connection.
pub struct MigrationRunner;

impl MigrationRunner {
    /// Runs all pending migrations in a transaction.
    ///
    /// Creates the `schema_version` table if it doesn't exist, then applies
    /// any migrations whose version is greater than the current schema version.
    /// If any migration fails, all changes are rolled back.
    pub fn run(conn: &Connection, migrations: &[Migration]) -> Result<(), StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            );",
        )?;

        let current_version = Self::current_version(conn)?;

        let pending: Vec<&Migration> = migrations
            .iter()
            .filter(|m| m.version > current_version)
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        for window in pending.windows(2) {
            if window[0].version >= window[1].version {
                return Err(StorageError::Migration(format!(
                    "Migrations are not in order: v{} before v{}",
                    window[0].version, window[1].version
                )));
            }
        }

        conn.execute_batch("BEGIN EXCLUSIVE TRANSACTION;")?;

        for migration in &pending {
            let applied = match &migration.action {
                MigrationAction::Sql(sql) => conn.execute_batch(sql).map_err(StorageError::from),
                MigrationAction::Callback(cb) => cb(conn),
            };
            if let Err(e) = applied {
                conn.execute_batch("ROLLBACK;")?;
                return Err(StorageError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e
                )));
            }

            let now = crate::clock::current_timestamp_millis();
            if let Err(e) = conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![migration.version, now],
            ) {
                conn.execute_batch("ROLLBACK;")?;
                return Err(StorageError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e
                )));
            }
            tracing::debug!(
                version = migration.version,
                name = migration.name,
                "applied migration"
            );
        }

        conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    /// Returns the current schema version, or 0 if no migrations have been applied.
    pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
        let table_exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        let version: Option<u32> =
            conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })?;

        Ok(version.unwrap_or(0))
    }
}

/// Returns all registered migrations in version order.
///
/// New migrations are appended to the end of this list.
pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "baseline_networks",
            action: MigrationAction::Sql(MIGRATION_V1_NETWORKS),
        },
        Migration {
            version: 2,
            name: "persons_and_entity_tables",
            action: MigrationAction::Callback(migrate_v2_entity_tables),
        },
        Migration {
            version: 3,
            name: "lookup_definitions",
            action: MigrationAction::Sql(MIGRATION_V3_LOOKUPS),
        },
        Migration {
            version: 4,
            name: "sync_leases",
            action: MigrationAction::Sql(MIGRATION_V4_LEASES),
        },
        Migration {
            version: 5,
            name: "mirror_stale_owners",
            action: MigrationAction::Sql(MIGRATION_V5_MIRROR_STALE),
        },
    ]
}

/// Migration v1: peers, their shared secrets, and per-domain cursors.
const MIGRATION_V1_NETWORKS: &str = "
    CREATE TABLE IF NOT EXISTS networks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        network_token TEXT NOT NULL UNIQUE,
        api_domain TEXT NOT NULL,
        is_self INTEGER NOT NULL DEFAULT 0,
        is_online INTEGER NOT NULL DEFAULT 1,
        is_blocked INTEGER NOT NULL DEFAULT 0,
        keys_exchanged INTEGER NOT NULL DEFAULT 0,
        created INTEGER NOT NULL,
        updated INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS network_secrets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        network_id INTEGER NOT NULL REFERENCES networks(id),
        direction TEXT NOT NULL CHECK (direction IN ('to', 'from')),
        secret_key TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created INTEGER NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_network_secrets_active
        ON network_secrets(network_id, direction) WHERE is_active = 1;

    CREATE TABLE IF NOT EXISTS sync_cursors (
        network_id INTEGER NOT NULL REFERENCES networks(id),
        sync_domain TEXT NOT NULL,
        last_synchronized INTEGER NOT NULL,
        updated INTEGER NOT NULL,
        PRIMARY KEY (network_id, sync_domain)
    );
";

/// Migration v2: persons plus one table per owned entity kind.
///
/// Owned tables share one shape so the reconciliation engine can address
/// them by name.
fn migrate_v2_entity_tables(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS persons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_token TEXT NOT NULL UNIQUE,
            payload TEXT NOT NULL,
            updated INTEGER NOT NULL,
            deleted INTEGER,
            created INTEGER NOT NULL,
            origin_network_id INTEGER REFERENCES networks(id)
        );
        CREATE INDEX IF NOT EXISTS idx_persons_updated ON persons(updated);",
    )?;

    for kind in EntityKind::ALL {
        if kind.creates_owner() {
            continue;
        }
        let table = kind.table();
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                person_id INTEGER NOT NULL REFERENCES persons(id),
                entity_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                updated INTEGER NOT NULL,
                deleted INTEGER,
                created INTEGER NOT NULL,
                origin_network_id INTEGER REFERENCES networks(id),
                UNIQUE (person_id, entity_key)
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_updated ON {table}(updated);"
        ))?;
    }

    Ok(())
}

/// Migration v3: auxiliary lookup definitions hydrated on demand.
const MIGRATION_V3_LOOKUPS: &str = "
    CREATE TABLE IF NOT EXISTS lookups (
        kind TEXT NOT NULL,
        token TEXT NOT NULL,
        payload TEXT NOT NULL,
        fetched_at INTEGER NOT NULL,
        PRIMARY KEY (kind, token)
    );
";

/// Migration v4: per (peer, domain) leases serializing overlapping runs.
const MIGRATION_V4_LEASES: &str = "
    CREATE TABLE IF NOT EXISTS sync_leases (
        network_id INTEGER NOT NULL REFERENCES networks(id),
        sync_domain TEXT NOT NULL,
        holder TEXT NOT NULL,
        acquired_at INTEGER NOT NULL,
        PRIMARY KEY (network_id, sync_domain)
    );
";

/// Migration v5: owners whose cache mirror entry missed a write.
const MIGRATION_V5_MIRROR_STALE: &str = "
    CREATE TABLE IF NOT EXISTS mirror_stale_owners (
        owner TEXT PRIMARY KEY,
        marked_at INTEGER NOT NULL
    );
";
