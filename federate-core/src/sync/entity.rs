// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Replicated entity types and the page wire format.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One category of replicated data, synchronized with its own cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDomain {
    Persons,
    Filters,
    Modes,
    Sections,
    Reviews,
    NoShows,
    Networks,
}

impl SyncDomain {
    /// Every domain, in the order a cycle visits them. Persons come first
    /// so owners exist before their attached data arrives.
    pub const ALL: [SyncDomain; 7] = [
        SyncDomain::Persons,
        SyncDomain::Networks,
        SyncDomain::Filters,
        SyncDomain::Modes,
        SyncDomain::Sections,
        SyncDomain::Reviews,
        SyncDomain::NoShows,
    ];

    /// Persisted name, also the endpoint path segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDomain::Persons => "persons",
            SyncDomain::Filters => "filters",
            SyncDomain::Modes => "modes",
            SyncDomain::Sections => "sections",
            SyncDomain::Reviews => "reviews",
            SyncDomain::NoShows => "no_shows",
            SyncDomain::Networks => "networks",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }

    /// The entity kind carried by this domain.
    pub fn kind(&self) -> EntityKind {
        match self {
            SyncDomain::Persons => EntityKind::PersonAttribute,
            SyncDomain::Filters => EntityKind::FilterSetting,
            SyncDomain::Modes => EntityKind::ModeAssignment,
            SyncDomain::Sections => EntityKind::SectionItem,
            SyncDomain::Reviews => EntityKind::ReviewRating,
            SyncDomain::NoShows => EntityKind::NoShowFlag,
            SyncDomain::Networks => EntityKind::PersonNetworkMembership,
        }
    }
}

impl fmt::Display for SyncDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminator of [`EntityPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    PersonAttribute,
    FilterSetting,
    ModeAssignment,
    SectionItem,
    ReviewRating,
    NoShowFlag,
    PersonNetworkMembership,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::PersonAttribute,
        EntityKind::FilterSetting,
        EntityKind::ModeAssignment,
        EntityKind::SectionItem,
        EntityKind::ReviewRating,
        EntityKind::NoShowFlag,
        EntityKind::PersonNetworkMembership,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::PersonAttribute => "person_attribute",
            EntityKind::FilterSetting => "filter_setting",
            EntityKind::ModeAssignment => "mode_assignment",
            EntityKind::SectionItem => "section_item",
            EntityKind::ReviewRating => "review_rating",
            EntityKind::NoShowFlag => "no_show_flag",
            EntityKind::PersonNetworkMembership => "person_network_membership",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Relational table holding this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::PersonAttribute => "persons",
            EntityKind::FilterSetting => "person_filters",
            EntityKind::ModeAssignment => "person_modes",
            EntityKind::SectionItem => "person_sections",
            EntityKind::ReviewRating => "activity_reviews",
            EntityKind::NoShowFlag => "activity_no_shows",
            EntityKind::PersonNetworkMembership => "person_networks",
        }
    }

    pub fn domain(&self) -> SyncDomain {
        match self {
            EntityKind::PersonAttribute => SyncDomain::Persons,
            EntityKind::FilterSetting => SyncDomain::Filters,
            EntityKind::ModeAssignment => SyncDomain::Modes,
            EntityKind::SectionItem => SyncDomain::Sections,
            EntityKind::ReviewRating => SyncDomain::Reviews,
            EntityKind::NoShowFlag => SyncDomain::NoShows,
            EntityKind::PersonNetworkMembership => SyncDomain::Networks,
        }
    }

    /// True for the kind whose rows are the owner records themselves.
    pub fn creates_owner(&self) -> bool {
        matches!(self, EntityKind::PersonAttribute)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile attributes of a person. The owner record itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonAttribute {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub gender_token: Option<String>,
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub is_verified: bool,
}

/// A person's setting for one catalog filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSetting {
    pub filter_token: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_send: bool,
    #[serde(default)]
    pub is_receive: bool,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Activity mode a person has switched on or off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeAssignment {
    pub mode_token: String,
    #[serde(default)]
    pub is_active: bool,
}

/// An item a person added to one of their profile sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionItem {
    pub section_token: String,
    pub item_token: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub favorite_position: Option<u32>,
}

/// A rating one person left for another after an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRating {
    pub activity_token: String,
    pub person_to_token: String,
    pub rating_type: String,
    pub rating: f64,
}

/// Whether a participant failed to show up to an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoShowFlag {
    pub activity_token: String,
    pub person_to_token: String,
    pub no_show: bool,
}

/// A person's membership of a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonNetworkMembership {
    pub network_token: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Typed payload, tagged by kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EntityPayload {
    PersonAttribute(PersonAttribute),
    FilterSetting(FilterSetting),
    ModeAssignment(ModeAssignment),
    SectionItem(SectionItem),
    ReviewRating(ReviewRating),
    NoShowFlag(NoShowFlag),
    PersonNetworkMembership(PersonNetworkMembership),
}

impl EntityPayload {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPayload::PersonAttribute(_) => EntityKind::PersonAttribute,
            EntityPayload::FilterSetting(_) => EntityKind::FilterSetting,
            EntityPayload::ModeAssignment(_) => EntityKind::ModeAssignment,
            EntityPayload::SectionItem(_) => EntityKind::SectionItem,
            EntityPayload::ReviewRating(_) => EntityKind::ReviewRating,
            EntityPayload::NoShowFlag(_) => EntityKind::NoShowFlag,
            EntityPayload::PersonNetworkMembership(_) => EntityKind::PersonNetworkMembership,
        }
    }

    /// Serializes the payload body (without the kind tag) for storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            EntityPayload::PersonAttribute(p) => serde_json::to_string(p),
            EntityPayload::FilterSetting(p) => serde_json::to_string(p),
            EntityPayload::ModeAssignment(p) => serde_json::to_string(p),
            EntityPayload::SectionItem(p) => serde_json::to_string(p),
            EntityPayload::ReviewRating(p) => serde_json::to_string(p),
            EntityPayload::NoShowFlag(p) => serde_json::to_string(p),
            EntityPayload::PersonNetworkMembership(p) => serde_json::to_string(p),
        }
    }

    /// Inverse of [`EntityPayload::to_json`].
    pub fn from_json(kind: EntityKind, json: &str) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EntityKind::PersonAttribute => EntityPayload::PersonAttribute(serde_json::from_str(json)?),
            EntityKind::FilterSetting => EntityPayload::FilterSetting(serde_json::from_str(json)?),
            EntityKind::ModeAssignment => EntityPayload::ModeAssignment(serde_json::from_str(json)?),
            EntityKind::SectionItem => EntityPayload::SectionItem(serde_json::from_str(json)?),
            EntityKind::ReviewRating => EntityPayload::ReviewRating(serde_json::from_str(json)?),
            EntityKind::NoShowFlag => EntityPayload::NoShowFlag(serde_json::from_str(json)?),
            EntityKind::PersonNetworkMembership => {
                EntityPayload::PersonNetworkMembership(serde_json::from_str(json)?)
            }
        })
    }
}

/// One replicated record as exchanged between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncableEntity {
    /// Owner reference.
    pub person_token: String,
    /// Natural key within the owner.
    pub entity_token: String,
    /// Authoritative clock of the home node.
    pub updated: i64,
    /// Tombstone timestamp for soft deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<i64>,
    #[serde(flatten)]
    pub payload: EntityPayload,
}

impl SyncableEntity {
    pub fn new(
        person_token: impl Into<String>,
        entity_token: impl Into<String>,
        updated: i64,
        payload: EntityPayload,
    ) -> Self {
        SyncableEntity {
            person_token: person_token.into(),
            entity_token: entity_token.into(),
            updated,
            deleted: None,
            payload,
        }
    }

    /// Person record entity; the natural key is the person token.
    pub fn person(person_token: &str, updated: i64, attributes: PersonAttribute) -> Self {
        Self::new(
            person_token,
            person_token,
            updated,
            EntityPayload::PersonAttribute(attributes),
        )
    }

    /// Marks the entity as soft-deleted at `deleted`.
    pub fn tombstoned(mut self, deleted: i64) -> Self {
        self.deleted = Some(deleted);
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    pub fn is_tombstone(&self) -> bool {
        self.deleted.is_some()
    }
}

/// One response unit of the sync endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemotePage {
    #[serde(default)]
    pub items: Vec<SyncableEntity>,
    /// Continuation token: max `updated` in this page, absent on the last page.
    #[serde(default)]
    pub pagination_updated: Option<i64>,
    /// Lower bound of the cycle's window, echoed across pages.
    #[serde(default)]
    pub prev_data_since: Option<i64>,
}

impl RemotePage {
    pub fn has_more(&self) -> bool {
        self.pagination_updated.is_some()
    }
}
