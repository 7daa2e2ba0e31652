// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reconciliation Engine
//!
//! Merges one page of remote entities into the local store. The rule is
//! last-writer-wins on the home node's `updated` timestamp, strictly
//! greater, so applying the same page twice changes nothing the second time.

use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, warn};

use crate::network::LookupSource;
use crate::storage::{LookupKey, RowWrite, Storage, StorageError};

use super::entity::{EntityKind, SyncDomain, SyncableEntity};
use super::handler::{HandlerRegistry, Reference};

/// Reconciliation errors. Entity-level problems are reported as invalid
/// outcomes instead; only failures that abort the page end up here.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Per-entity result.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityOutcome {
    Inserted,
    Updated,
    Skipped,
    Invalid(String),
}

/// An entity that was rejected, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidEntity {
    pub person_token: String,
    pub entity_token: String,
    pub kind: EntityKind,
    pub reason: String,
}

/// Aggregated result of reconciling one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub invalid: Vec<InvalidEntity>,
    /// Entities actually written, in page order.
    pub changes: Vec<SyncableEntity>,
}

impl PageOutcome {
    pub fn invalid_count(&self) -> usize {
        self.invalid.len()
    }

    /// Owners whose stored data changed.
    pub fn touched_owners(&self) -> BTreeSet<String> {
        self.changes.iter().map(|e| e.person_token.clone()).collect()
    }

    fn record(&mut self, entity: &SyncableEntity, outcome: EntityOutcome) {
        match outcome {
            EntityOutcome::Inserted => {
                self.inserted += 1;
                self.changes.push(entity.clone());
            }
            EntityOutcome::Updated => {
                self.updated += 1;
                self.changes.push(entity.clone());
            }
            EntityOutcome::Skipped => self.skipped += 1,
            EntityOutcome::Invalid(reason) => self.invalid.push(InvalidEntity {
                person_token: entity.person_token.clone(),
                entity_token: entity.entity_token.clone(),
                kind: entity.kind(),
                reason,
            }),
        }
    }
}

/// Applies remote pages to the local store.
pub struct ReconciliationEngine {
    handlers: HandlerRegistry,
    chunk_size: usize,
}

impl ReconciliationEngine {
    pub fn new(chunk_size: usize) -> Self {
        Self::with_handlers(HandlerRegistry::standard(), chunk_size)
    }

    pub fn with_handlers(handlers: HandlerRegistry, chunk_size: usize) -> Self {
        ReconciliationEngine {
            handlers,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Reconciles the entities of one page received for `domain`.
    ///
    /// `origin_network_id` is the peer the page came from. All writes happen
    /// in a single transaction; a storage error rolls the page back.
    pub async fn reconcile_page<L: LookupSource>(
        &self,
        storage: &Storage,
        domain: SyncDomain,
        origin_network_id: i64,
        entities: &[SyncableEntity],
        lookups: &L,
        now: i64,
    ) -> Result<PageOutcome, ReconcileError> {
        let kind = domain.kind();
        let mut outcome = PageOutcome::default();

        // Kind and payload checks, then collapse duplicate keys to the
        // newest occurrence.
        let mut candidates: Vec<&SyncableEntity> = Vec::new();
        let mut by_key: HashMap<(&str, &str), usize> = HashMap::new();
        for entity in entities {
            if let Err(reason) = self.validate(domain, entity) {
                outcome.record(entity, EntityOutcome::Invalid(reason));
                continue;
            }
            let key = (entity.person_token.as_str(), entity.entity_token.as_str());
            match by_key.get(&key) {
                Some(&idx) if candidates[idx].updated >= entity.updated => {
                    outcome.record(entity, EntityOutcome::Skipped);
                }
                Some(&idx) => {
                    outcome.record(candidates[idx], EntityOutcome::Skipped);
                    candidates[idx] = entity;
                }
                None => {
                    by_key.insert(key, candidates.len());
                    candidates.push(entity);
                }
            }
        }

        if candidates.is_empty() {
            self.log_invalid(domain, origin_network_id, &outcome);
            return Ok(outcome);
        }

        // Resolve owners and every referenced person in one pass.
        let mut person_tokens: BTreeSet<String> = BTreeSet::new();
        let mut network_tokens: BTreeSet<String> = BTreeSet::new();
        let mut lookup_keys: BTreeSet<LookupKey> = BTreeSet::new();
        let mut references: Vec<Vec<Reference>> = Vec::with_capacity(candidates.len());
        for entity in &candidates {
            person_tokens.insert(entity.person_token.clone());
            let refs = self
                .handlers
                .get(kind)
                .map(|h| h.references(entity))
                .unwrap_or_default();
            for reference in &refs {
                match reference {
                    Reference::Person(token) => {
                        person_tokens.insert(token.clone());
                    }
                    Reference::Network(token) => {
                        network_tokens.insert(token.clone());
                    }
                    Reference::Lookup(key) => {
                        lookup_keys.insert(key.clone());
                    }
                }
            }
            references.push(refs);
        }

        let person_tokens: Vec<String> = person_tokens.into_iter().collect();
        let owners = storage.resolve_persons(&person_tokens, self.chunk_size)?;

        let mut known_networks = HashSet::new();
        for token in network_tokens {
            if storage.peer_by_token(&token)?.is_some() {
                known_networks.insert(token);
            }
        }

        let known_lookups = self
            .hydrate_lookups(storage, lookup_keys, lookups, now)
            .await?;

        // Reference checks.
        let mut resolved: Vec<&SyncableEntity> = Vec::with_capacity(candidates.len());
        for (entity, refs) in candidates.iter().copied().zip(&references) {
            let unresolved = if !kind.creates_owner() && !owners.contains_key(&entity.person_token)
            {
                Some(format!("unknown owner {}", entity.person_token))
            } else {
                refs.iter().find_map(|reference| match reference {
                    Reference::Person(token) if !owners.contains_key(token) => {
                        Some(format!("unknown person {}", token))
                    }
                    Reference::Network(token) if !known_networks.contains(token) => {
                        Some(format!("unknown network {}", token))
                    }
                    Reference::Lookup(key) if !known_lookups.contains(key) => {
                        Some(format!("unresolvable lookup {}", key))
                    }
                    _ => None,
                })
            };

            match unresolved {
                Some(reason) => outcome.record(entity, EntityOutcome::Invalid(reason)),
                None => resolved.push(entity),
            }
        }

        // Compare against local state.
        let local: HashMap<(i64, String), i64> = if kind.creates_owner() {
            owners
                .iter()
                .map(|(token, owner)| ((0, token.clone()), owner.updated))
                .collect()
        } else {
            let keys: Vec<(i64, String)> = resolved
                .iter()
                .filter_map(|e| {
                    owners
                        .get(&e.person_token)
                        .map(|o| (o.id, e.entity_token.clone()))
                })
                .collect();
            storage
                .local_states(kind, &keys, self.chunk_size)?
                .into_iter()
                .map(|(key, state)| (key, state.updated))
                .collect()
        };

        let mut writes = Vec::new();
        let mut decisions = Vec::new();
        for entity in resolved {
            let person_id = if kind.creates_owner() {
                0
            } else {
                owners.get(&entity.person_token).map(|o| o.id).unwrap_or(0)
            };

            let decision = match local.get(&(person_id, entity.entity_token.clone())) {
                None => EntityOutcome::Inserted,
                Some(&local_updated) if entity.updated > local_updated => EntityOutcome::Updated,
                Some(_) => EntityOutcome::Skipped,
            };

            if decision != EntityOutcome::Skipped {
                let payload = match entity.payload.to_json() {
                    Ok(payload) => payload,
                    Err(e) => {
                        outcome.record(entity, EntityOutcome::Invalid(e.to_string()));
                        continue;
                    }
                };
                writes.push(RowWrite {
                    person_id,
                    entity_key: entity.entity_token.clone(),
                    payload,
                    updated: entity.updated,
                    deleted: entity.deleted,
                    origin_network_id: Some(origin_network_id),
                });
            }
            decisions.push((entity, decision));
        }

        storage.write_rows(kind, &writes, self.chunk_size, now)?;

        for (entity, decision) in decisions {
            outcome.record(entity, decision);
        }

        debug!(
            domain = %domain,
            network = origin_network_id,
            inserted = outcome.inserted,
            updated = outcome.updated,
            skipped = outcome.skipped,
            invalid = outcome.invalid_count(),
            "page reconciled"
        );
        self.log_invalid(domain, origin_network_id, &outcome);

        Ok(outcome)
    }

    fn validate(&self, domain: SyncDomain, entity: &SyncableEntity) -> Result<(), String> {
        if entity.kind() != domain.kind() {
            return Err(format!("kind {} not carried by domain {}", entity.kind(), domain));
        }
        if entity.person_token.trim().is_empty() || entity.entity_token.trim().is_empty() {
            return Err("empty person or entity token".into());
        }
        let handler = self
            .handlers
            .get(entity.kind())
            .ok_or_else(|| format!("no handler for {}", entity.kind()))?;
        handler.validate(entity)
    }

    /// Returns the subset of `keys` available locally, fetching missing ones
    /// from `source` and caching what it returns.
    async fn hydrate_lookups<L: LookupSource>(
        &self,
        storage: &Storage,
        keys: BTreeSet<LookupKey>,
        source: &L,
        now: i64,
    ) -> Result<HashSet<LookupKey>, ReconcileError> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let keys: Vec<LookupKey> = keys.into_iter().collect();
        let mut known = storage.known_lookups(&keys)?;

        let missing: Vec<LookupKey> = keys
            .iter()
            .filter(|k| !known.contains(*k))
            .cloned()
            .collect();

        for key in &missing {
            match source.fetch_lookup(key).await {
                Ok(Some(definition)) => {
                    storage.save_lookup(&definition, now)?;
                    known.insert(key.clone());
                }
                Ok(None) => {
                    debug!(lookup = %key, "lookup unknown to source");
                }
                Err(e) => {
                    warn!(lookup = %key, error = %e, "lookup hydration failed");
                }
            }
        }
        Ok(known)
    }

    fn log_invalid(&self, domain: SyncDomain, origin_network_id: i64, outcome: &PageOutcome) {
        for invalid in &outcome.invalid {
            warn!(
                domain = %domain,
                network = origin_network_id,
                person = %invalid.person_token,
                entity = %invalid.entity_token,
                kind = %invalid.kind,
                reason = %invalid.reason,
                "invalid entity skipped"
            );
        }
    }
}
