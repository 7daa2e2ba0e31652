// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Auxiliary lookup definitions (filter and section catalogs).
//!
//! Entities that reference a definition unknown locally trigger a hydration
//! fetch; the result is kept here so the next reference resolves locally.

use std::collections::HashSet;
use std::fmt;

use rusqlite::{params, params_from_iter, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{Storage, StorageError};

/// Catalogs that entities may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    Filter,
    Section,
}

impl LookupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupKind::Filter => "filter",
            LookupKind::Section => "section",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "filter" => Some(LookupKind::Filter),
            "section" => Some(LookupKind::Section),
            _ => None,
        }
    }
}

/// Reference to one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LookupKey {
    pub kind: LookupKind,
    pub token: String,
}

impl LookupKey {
    pub fn new(kind: LookupKind, token: impl Into<String>) -> Self {
        LookupKey {
            kind,
            token: token.into(),
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.token)
    }
}

/// A catalog entry as served by the authoritative lookup source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupDefinition {
    pub kind: LookupKind,
    pub token: String,
    pub payload: serde_json::Value,
}

impl LookupDefinition {
    pub fn key(&self) -> LookupKey {
        LookupKey::new(self.kind, self.token.clone())
    }
}

impl Storage {
    /// Stores (or refreshes) a lookup definition.
    pub fn save_lookup(&self, definition: &LookupDefinition, now: i64) -> Result<(), StorageError> {
        let payload = serde_json::to_string(&definition.payload)?;
        self.conn.execute(
            "INSERT INTO lookups (kind, token, payload, fetched_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (kind, token) DO UPDATE SET payload = excluded.payload, fetched_at = excluded.fetched_at",
            params![definition.kind.as_str(), definition.token, payload, now],
        )?;
        Ok(())
    }

    /// Loads a single lookup definition.
    pub fn lookup(&self, key: &LookupKey) -> Result<Option<LookupDefinition>, StorageError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM lookups WHERE kind = ?1 AND token = ?2",
                params![key.kind.as_str(), key.token],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|p| -> Result<LookupDefinition, StorageError> {
                Ok(LookupDefinition {
                    kind: key.kind,
                    token: key.token.clone(),
                    payload: serde_json::from_str(&p)?,
                })
            })
            .transpose()
    }

    /// Returns the subset of `keys` already known locally.
    pub fn known_lookups(&self, keys: &[LookupKey]) -> Result<HashSet<LookupKey>, StorageError> {
        let mut known = HashSet::new();
        for chunk in keys.chunks(500) {
            let placeholders = vec!["(?, ?)"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT kind, token FROM lookups WHERE (kind, token) IN (VALUES {placeholders})"
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let values = chunk
                .iter()
                .flat_map(|k| [k.kind.as_str().to_string(), k.token.clone()]);
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (kind, token) = row?;
                if let Some(kind) = LookupKind::parse(&kind) {
                    known.insert(LookupKey::new(kind, token));
                }
            }
        }
        Ok(known)
    }
}
