// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Module
//!
//! Pull-based replication: entity model, per-kind handlers, page
//! reconciliation, cache mirroring, the per-(peer, domain) cycle, the
//! serving-side exporter and the orchestrator driving them.

mod cycle;
mod entity;
mod export;
mod handler;
mod mirror;
mod orchestrator;
mod reconcile;

pub use cycle::{CycleReport, SyncCycle};
pub use entity::{
    EntityKind, EntityPayload, FilterSetting, ModeAssignment, NoShowFlag, PersonAttribute,
    PersonNetworkMembership, RemotePage, ReviewRating, SectionItem, SyncDomain, SyncableEntity,
};
pub use export::{ExportQuery, SyncExporter, DEFAULT_MAX_PAGE_LIMIT};
pub use handler::{EntityHandler, HandlerRegistry, Reference};
pub use mirror::{
    field_name, CacheMirror, MemoryCacheMirror, MirrorError, MirrorSynchronizer, Projection,
    SqliteCacheMirror,
};
pub use orchestrator::{RunReport, SyncOrchestrator};
pub use reconcile::{
    EntityOutcome, InvalidEntity, PageOutcome, ReconcileError, ReconciliationEngine,
};
