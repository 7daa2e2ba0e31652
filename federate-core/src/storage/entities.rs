// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Replicated entity rows.
//!
//! Batched reads and timestamp-gated batched writes used by the
//! reconciliation engine, plus the row queries behind page export and cache
//! rebuilds. Every statement here addresses many rows at once.

use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

use super::{Storage, StorageError};
use crate::sync::{EntityKind, EntityPayload, SyncableEntity};

/// A resolved person record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerRef {
    pub id: i64,
    pub updated: i64,
}

/// Timestamp of an existing local row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalState {
    pub updated: i64,
}

/// A row to insert or, if newer, update.
#[derive(Debug, Clone)]
pub struct RowWrite {
    /// Resolved owner; ignored for person rows.
    pub person_id: i64,
    pub entity_key: String,
    pub payload: String,
    pub updated: i64,
    pub deleted: Option<i64>,
    /// Peer the row was received from; `None` for locally authored rows.
    pub origin_network_id: Option<i64>,
}

/// A stored entity with its owner token.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub id: i64,
    pub kind: EntityKind,
    pub person_token: String,
    pub entity_key: String,
    pub payload: String,
    pub updated: i64,
    pub deleted: Option<i64>,
}

impl EntityRow {
    /// Rebuilds the wire form of this row.
    pub fn to_entity(&self) -> Result<SyncableEntity, StorageError> {
        Ok(SyncableEntity {
            person_token: self.person_token.clone(),
            entity_token: self.entity_key.clone(),
            updated: self.updated,
            deleted: self.deleted,
            payload: EntityPayload::from_json(self.kind, &self.payload)?,
        })
    }
}

fn placeholders(rows: usize, columns: usize) -> String {
    let row = format!("({})", vec!["?"; columns].join(", "));
    vec![row.as_str(); rows].join(", ")
}

fn opt_int(v: Option<i64>) -> Value {
    v.map(Value::Integer).unwrap_or(Value::Null)
}

impl Storage {
    /// Resolves person tokens to local records, tombstoned or not, with at
    /// most `chunk_size` tokens bound per statement.
    pub fn resolve_persons(
        &self,
        tokens: &[String],
        chunk_size: usize,
    ) -> Result<HashMap<String, OwnerRef>, StorageError> {
        let mut resolved = HashMap::new();
        for chunk in tokens.chunks(chunk_size.max(1)) {
            let sql = format!(
                "SELECT person_token, id, updated FROM persons WHERE person_token IN ({})",
                vec!["?"; chunk.len()].join(", ")
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    OwnerRef {
                        id: row.get(1)?,
                        updated: row.get(2)?,
                    },
                ))
            })?;
            for row in rows {
                let (token, owner) = row?;
                resolved.insert(token, owner);
            }
        }
        Ok(resolved)
    }

    /// Loads the `updated` timestamp of existing rows of an owned kind,
    /// keyed by (person_id, entity_key).
    pub fn local_states(
        &self,
        kind: EntityKind,
        keys: &[(i64, String)],
        chunk_size: usize,
    ) -> Result<HashMap<(i64, String), LocalState>, StorageError> {
        if kind.creates_owner() {
            return Err(StorageError::InvalidValue(format!(
                "{} rows are resolved as owners",
                kind
            )));
        }

        let mut states = HashMap::new();
        for chunk in keys.chunks(chunk_size.max(1)) {
            let sql = format!(
                "SELECT person_id, entity_key, updated FROM {} \
                 WHERE (person_id, entity_key) IN (VALUES {})",
                kind.table(),
                placeholders(chunk.len(), 2)
            );
            let values = chunk
                .iter()
                .flat_map(|(id, key)| [Value::Integer(*id), Value::Text(key.clone())]);
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok((
                    (row.get::<_, i64>(0)?, row.get::<_, String>(1)?),
                    LocalState {
                        updated: row.get(2)?,
                    },
                ))
            })?;
            for row in rows {
                let (key, state) = row?;
                states.insert(key, state);
            }
        }
        Ok(states)
    }

    /// Writes rows in chunks inside one transaction.
    ///
    /// New keys are inserted with `created = now`; existing keys are only
    /// overwritten when the incoming `updated` is strictly newer. Either all
    /// chunks commit or none do.
    pub fn write_rows(
        &self,
        kind: EntityKind,
        rows: &[RowWrite],
        chunk_size: usize,
        now: i64,
    ) -> Result<usize, StorageError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut changed = 0;
        for chunk in rows.chunks(chunk_size.max(1)) {
            let (sql, values) = upsert_statement(kind, chunk, now);
            changed += tx.execute(&sql, params_from_iter(values))?;
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Writes a locally authored entity (no origin peer).
    ///
    /// Used by the home node's business layer; remote data goes through
    /// reconciliation instead.
    pub fn record_local_entity(
        &self,
        entity: &SyncableEntity,
        now: i64,
    ) -> Result<(), StorageError> {
        let kind = entity.kind();
        let person_id = if kind.creates_owner() {
            0
        } else {
            self.resolve_persons(std::slice::from_ref(&entity.person_token), 1)?
                .get(&entity.person_token)
                .map(|o| o.id)
                .ok_or_else(|| StorageError::NotFound(format!("person {}", entity.person_token)))?
        };

        let row = RowWrite {
            person_id,
            entity_key: entity.entity_token.clone(),
            payload: entity.payload.to_json()?,
            updated: entity.updated,
            deleted: entity.deleted,
            origin_network_id: None,
        };
        self.write_rows(kind, std::slice::from_ref(&row), 1, now)?;
        Ok(())
    }

    /// Locally authored rows with `updated > after`, oldest first.
    pub fn local_rows_after(
        &self,
        kind: EntityKind,
        after: i64,
        limit: usize,
    ) -> Result<Vec<EntityRow>, StorageError> {
        let sql = format!(
            "{} WHERE t.origin_network_id IS NULL AND t.updated > ?1 \
             ORDER BY t.updated, t.id LIMIT ?2",
            select_rows(kind)
        );
        self.query_rows(kind, &sql, params![after, limit as i64])
    }

    /// Locally authored rows sharing `updated` exactly, after row `after_id`.
    pub fn local_rows_at(
        &self,
        kind: EntityKind,
        updated: i64,
        after_id: i64,
    ) -> Result<Vec<EntityRow>, StorageError> {
        let sql = format!(
            "{} WHERE t.origin_network_id IS NULL AND t.updated = ?1 AND t.id > ?2 \
             ORDER BY t.id",
            select_rows(kind)
        );
        self.query_rows(kind, &sql, params![updated, after_id])
    }

    /// Every stored row owned by a person, across all kinds.
    pub fn owner_rows(&self, person_token: &str) -> Result<Vec<EntityRow>, StorageError> {
        let mut rows = Vec::new();
        for kind in EntityKind::ALL {
            let sql = format!("{} WHERE p.person_token = ?1 ORDER BY t.id", select_rows(kind));
            rows.extend(self.query_rows(kind, &sql, params![person_token])?);
        }
        Ok(rows)
    }

    /// Loads a single row by natural key.
    pub fn entity_row(
        &self,
        kind: EntityKind,
        person_token: &str,
        entity_key: &str,
    ) -> Result<Option<EntityRow>, StorageError> {
        let sql = format!(
            "{} WHERE p.person_token = ?1 AND t.{} = ?2",
            select_rows(kind),
            if kind.creates_owner() {
                "person_token"
            } else {
                "entity_key"
            }
        );
        Ok(self
            .query_rows(kind, &sql, params![person_token, entity_key])?
            .into_iter()
            .next())
    }

    /// Number of rows stored for a kind.
    pub fn count_rows(&self, kind: EntityKind) -> Result<usize, StorageError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn query_rows<P: rusqlite::Params>(
        &self,
        kind: EntityKind,
        sql: &str,
        params: P,
    ) -> Result<Vec<EntityRow>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(EntityRow {
                    id: row.get(0)?,
                    kind,
                    person_token: row.get(1)?,
                    entity_key: row.get(2)?,
                    payload: row.get(3)?,
                    updated: row.get(4)?,
                    deleted: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// `SELECT` prefix yielding (id, person_token, entity_key, payload, updated, deleted)
/// with the kind's table aliased `t` and persons aliased `p`.
fn select_rows(kind: EntityKind) -> String {
    if kind.creates_owner() {
        "SELECT t.id, t.person_token, t.person_token, t.payload, t.updated, t.deleted \
         FROM persons t JOIN persons p ON p.id = t.id"
            .to_string()
    } else {
        format!(
            "SELECT t.id, p.person_token, t.entity_key, t.payload, t.updated, t.deleted \
             FROM {} t JOIN persons p ON p.id = t.person_id",
            kind.table()
        )
    }
}

/// Builds one multi-row timestamp-gated upsert for `rows`.
fn upsert_statement(kind: EntityKind, rows: &[RowWrite], now: i64) -> (String, Vec<Value>) {
    let table = kind.table();
    let mut values = Vec::with_capacity(rows.len() * 7);

    let sql = if kind.creates_owner() {
        for row in rows {
            values.extend([
                Value::Text(row.entity_key.clone()),
                Value::Text(row.payload.clone()),
                Value::Integer(row.updated),
                opt_int(row.deleted),
                Value::Integer(now),
                opt_int(row.origin_network_id),
            ]);
        }
        format!(
            "INSERT INTO persons (person_token, payload, updated, deleted, created, origin_network_id) \
             VALUES {} \
             ON CONFLICT (person_token) DO UPDATE SET \
             payload = excluded.payload, updated = excluded.updated, deleted = excluded.deleted, \
             origin_network_id = excluded.origin_network_id \
             WHERE excluded.updated > persons.updated",
            placeholders(rows.len(), 6)
        )
    } else {
        for row in rows {
            values.extend([
                Value::Integer(row.person_id),
                Value::Text(row.entity_key.clone()),
                Value::Text(row.payload.clone()),
                Value::Integer(row.updated),
                opt_int(row.deleted),
                Value::Integer(now),
                opt_int(row.origin_network_id),
            ]);
        }
        format!(
            "INSERT INTO {table} (person_id, entity_key, payload, updated, deleted, created, origin_network_id) \
             VALUES {} \
             ON CONFLICT (person_id, entity_key) DO UPDATE SET \
             payload = excluded.payload, updated = excluded.updated, deleted = excluded.deleted, \
             origin_network_id = excluded.origin_network_id \
             WHERE excluded.updated > {table}.updated",
            placeholders(rows.len(), 7)
        )
    };

    (sql, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ModeAssignment, PersonAttribute};

    fn person_row(token: &str, updated: i64) -> RowWrite {
        RowWrite {
            person_id: 0,
            entity_key: token.to_string(),
            payload: "{}".to_string(),
            updated,
            deleted: None,
            origin_network_id: None,
        }
    }

    #[test]
    fn test_upsert_is_timestamp_gated() {
        let storage = Storage::in_memory().unwrap();
        storage
            .write_rows(EntityKind::PersonAttribute, &[person_row("tok_A", 1_000)], 10, 5)
            .unwrap();

        // Same timestamp, different payload: ignored
        let mut tie = person_row("tok_A", 1_000);
        tie.payload = r#"{"first_name":"Tie"}"#.into();
        let changed = storage
            .write_rows(EntityKind::PersonAttribute, &[tie], 10, 6)
            .unwrap();
        assert_eq!(changed, 0);

        // Newer: applied, created untouched
        let mut newer = person_row("tok_A", 1_001);
        newer.payload = r#"{"first_name":"New"}"#.into();
        storage
            .write_rows(EntityKind::PersonAttribute, &[newer], 10, 7)
            .unwrap();

        let row = storage
            .entity_row(EntityKind::PersonAttribute, "tok_A", "tok_A")
            .unwrap()
            .unwrap();
        assert_eq!(row.updated, 1_001);
        assert!(row.payload.contains("New"));
        let created: i64 = storage
            .conn
            .query_row("SELECT created FROM persons WHERE person_token = 'tok_A'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(created, 5);
    }

    #[test]
    fn test_chunked_writes_and_state_lookup() {
        let storage = Storage::in_memory().unwrap();
        let persons: Vec<RowWrite> = (0..25).map(|i| person_row(&format!("p{i}"), 10)).collect();
        storage
            .write_rows(EntityKind::PersonAttribute, &persons, 4, 1)
            .unwrap();
        assert_eq!(storage.count_rows(EntityKind::PersonAttribute).unwrap(), 25);

        let tokens: Vec<String> = (0..30).map(|i| format!("p{i}")).collect();
        let owners = storage.resolve_persons(&tokens, 4).unwrap();
        assert_eq!(owners.len(), 25);
        // A zero chunk size still resolves, one token per statement.
        assert_eq!(storage.resolve_persons(&tokens, 0).unwrap(), owners);

        let owner = owners["p3"];
        let modes = vec![RowWrite {
            person_id: owner.id,
            entity_key: "mode-solo".into(),
            payload: "{}".into(),
            updated: 20,
            deleted: None,
            origin_network_id: None,
        }];
        storage
            .write_rows(EntityKind::ModeAssignment, &modes, 4, 1)
            .unwrap();

        let states = storage
            .local_states(
                EntityKind::ModeAssignment,
                &[
                    (owner.id, "mode-solo".to_string()),
                    (owner.id, "mode-kids".to_string()),
                ],
                1,
            )
            .unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[&(owner.id, "mode-solo".to_string())].updated, 20);
    }

    #[test]
    fn test_local_rows_exclude_replicated() {
        let storage = Storage::in_memory().unwrap();
        let peer = storage
            .register_peer(&crate::storage::NewPeer::remote("net-b", "https://b.example"))
            .unwrap();

        storage
            .record_local_entity(&SyncableEntity::person("local", 100, PersonAttribute::default()), 1)
            .unwrap();
        let mut remote = person_row("remote", 200);
        remote.origin_network_id = Some(peer.id);
        storage
            .write_rows(EntityKind::PersonAttribute, &[remote], 10, 1)
            .unwrap();

        let rows = storage
            .local_rows_after(EntityKind::PersonAttribute, 0, 10)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].person_token, "local");
    }

    #[test]
    fn test_owner_rows_span_kinds() {
        let storage = Storage::in_memory().unwrap();
        storage
            .record_local_entity(&SyncableEntity::person("tok_A", 100, PersonAttribute::default()), 1)
            .unwrap();
        let mode = SyncableEntity::new(
            "tok_A",
            "mode-solo",
            110,
            EntityPayload::ModeAssignment(ModeAssignment {
                mode_token: "mode-solo".into(),
                is_active: true,
            }),
        );
        storage.record_local_entity(&mode, 1).unwrap();

        let rows = storage.owner_rows("tok_A").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].to_entity().unwrap(), mode);
    }

    #[test]
    fn test_record_local_entity_requires_owner() {
        let storage = Storage::in_memory().unwrap();
        let mode = SyncableEntity::new(
            "ghost",
            "mode-solo",
            110,
            EntityPayload::ModeAssignment(ModeAssignment {
                mode_token: "mode-solo".into(),
                is_active: true,
            }),
        );
        assert!(matches!(
            storage.record_local_entity(&mode, 1),
            Err(StorageError::NotFound(_))
        ));
    }
}
