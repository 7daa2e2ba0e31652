// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-kind reconciliation rules.
//!
//! Each entity kind has a handler that validates its payload and names the
//! references that must resolve locally before the entity can be applied.
//! The engine looks handlers up by kind instead of inspecting payloads.

use std::collections::HashMap;

use crate::storage::{LookupKey, LookupKind};

use super::entity::{EntityKind, EntityPayload, SyncableEntity};

/// Something an entity points at besides its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Another person, by token.
    Person(String),
    /// A registered network, by token.
    Network(String),
    /// A catalog entry that can be hydrated on demand.
    Lookup(LookupKey),
}

/// Validation and reference extraction for one entity kind.
pub trait EntityHandler: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Checks payload invariants. Returns a reason on failure.
    fn validate(&self, entity: &SyncableEntity) -> Result<(), String>;

    /// References that must resolve before the entity is applied.
    fn references(&self, _entity: &SyncableEntity) -> Vec<Reference> {
        Vec::new()
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("empty {}", field))
    } else {
        Ok(())
    }
}

struct PersonAttributeHandler;

impl EntityHandler for PersonAttributeHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::PersonAttribute
    }

    fn validate(&self, entity: &SyncableEntity) -> Result<(), String> {
        let EntityPayload::PersonAttribute(attrs) = &entity.payload else {
            return Err("payload kind mismatch".into());
        };
        if entity.entity_token != entity.person_token {
            return Err("person entity key must be the person token".into());
        }
        if let Some(year) = attrs.birth_year {
            if !(1900..=2100).contains(&year) {
                return Err(format!("implausible birth year {}", year));
            }
        }
        Ok(())
    }
}

struct FilterSettingHandler;

impl EntityHandler for FilterSettingHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::FilterSetting
    }

    fn validate(&self, entity: &SyncableEntity) -> Result<(), String> {
        let EntityPayload::FilterSetting(filter) = &entity.payload else {
            return Err("payload kind mismatch".into());
        };
        non_empty("filter_token", &filter.filter_token)
    }

    fn references(&self, entity: &SyncableEntity) -> Vec<Reference> {
        match &entity.payload {
            EntityPayload::FilterSetting(filter) => vec![Reference::Lookup(LookupKey::new(
                LookupKind::Filter,
                filter.filter_token.clone(),
            ))],
            _ => Vec::new(),
        }
    }
}

struct ModeAssignmentHandler;

impl EntityHandler for ModeAssignmentHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::ModeAssignment
    }

    fn validate(&self, entity: &SyncableEntity) -> Result<(), String> {
        let EntityPayload::ModeAssignment(mode) = &entity.payload else {
            return Err("payload kind mismatch".into());
        };
        non_empty("mode_token", &mode.mode_token)
    }
}

struct SectionItemHandler;

impl EntityHandler for SectionItemHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::SectionItem
    }

    fn validate(&self, entity: &SyncableEntity) -> Result<(), String> {
        let EntityPayload::SectionItem(item) = &entity.payload else {
            return Err("payload kind mismatch".into());
        };
        non_empty("section_token", &item.section_token)?;
        non_empty("item_token", &item.item_token)
    }

    fn references(&self, entity: &SyncableEntity) -> Vec<Reference> {
        match &entity.payload {
            EntityPayload::SectionItem(item) => vec![Reference::Lookup(LookupKey::new(
                LookupKind::Section,
                format!("{}:{}", item.section_token, item.item_token),
            ))],
            _ => Vec::new(),
        }
    }
}

struct ReviewRatingHandler;

impl EntityHandler for ReviewRatingHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::ReviewRating
    }

    fn validate(&self, entity: &SyncableEntity) -> Result<(), String> {
        let EntityPayload::ReviewRating(review) = &entity.payload else {
            return Err("payload kind mismatch".into());
        };
        non_empty("activity_token", &review.activity_token)?;
        non_empty("rating_type", &review.rating_type)?;
        if review.person_to_token == entity.person_token {
            return Err("self review".into());
        }
        if !review.rating.is_finite() || !(0.0..=5.0).contains(&review.rating) {
            return Err(format!("rating {} out of range", review.rating));
        }
        Ok(())
    }

    fn references(&self, entity: &SyncableEntity) -> Vec<Reference> {
        match &entity.payload {
            EntityPayload::ReviewRating(review) => {
                vec![Reference::Person(review.person_to_token.clone())]
            }
            _ => Vec::new(),
        }
    }
}

struct NoShowFlagHandler;

impl EntityHandler for NoShowFlagHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::NoShowFlag
    }

    fn validate(&self, entity: &SyncableEntity) -> Result<(), String> {
        let EntityPayload::NoShowFlag(flag) = &entity.payload else {
            return Err("payload kind mismatch".into());
        };
        non_empty("activity_token", &flag.activity_token)?;
        if flag.person_to_token == entity.person_token {
            return Err("self no-show".into());
        }
        Ok(())
    }

    fn references(&self, entity: &SyncableEntity) -> Vec<Reference> {
        match &entity.payload {
            EntityPayload::NoShowFlag(flag) => vec![Reference::Person(flag.person_to_token.clone())],
            _ => Vec::new(),
        }
    }
}

struct NetworkMembershipHandler;

impl EntityHandler for NetworkMembershipHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::PersonNetworkMembership
    }

    fn validate(&self, entity: &SyncableEntity) -> Result<(), String> {
        let EntityPayload::PersonNetworkMembership(membership) = &entity.payload else {
            return Err("payload kind mismatch".into());
        };
        non_empty("network_token", &membership.network_token)
    }

    fn references(&self, entity: &SyncableEntity) -> Vec<Reference> {
        match &entity.payload {
            EntityPayload::PersonNetworkMembership(membership) => {
                vec![Reference::Network(membership.network_token.clone())]
            }
            _ => Vec::new(),
        }
    }
}

/// Kind → handler map.
pub struct HandlerRegistry {
    handlers: HashMap<EntityKind, Box<dyn EntityHandler>>,
}

impl HandlerRegistry {
    /// Registry with a handler for every replicated kind.
    pub fn standard() -> Self {
        let mut registry = HandlerRegistry {
            handlers: HashMap::new(),
        };
        registry.register(Box::new(PersonAttributeHandler));
        registry.register(Box::new(FilterSettingHandler));
        registry.register(Box::new(ModeAssignmentHandler));
        registry.register(Box::new(SectionItemHandler));
        registry.register(Box::new(ReviewRatingHandler));
        registry.register(Box::new(NoShowFlagHandler));
        registry.register(Box::new(NetworkMembershipHandler));
        registry
    }

    /// Adds or replaces the handler for its kind.
    pub fn register(&mut self, handler: Box<dyn EntityHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: EntityKind) -> Option<&dyn EntityHandler> {
        self.handlers.get(&kind).map(|h| h.as_ref())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
