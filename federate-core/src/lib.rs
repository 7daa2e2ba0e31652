// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Federate Core Library
//!
//! Incremental replication of person records between independently operated
//! network nodes. Each node pulls, per peer and per sync domain, the entities
//! changed since its last successful cycle and merges them into a local
//! SQLite store with timestamp-gated upserts, then refreshes a cache mirror.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod network;
pub mod storage;
pub mod sync;

pub use auth::{AuthError, InboundAuthGate, InboundCredentials};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use network::{
    LookupSource, MockLookupSource, MockPeerTransport, NetworkError, PageRequest, PeerTransport,
};
#[cfg(feature = "http")]
pub use network::{HttpLookupSource, HttpPeerTransport, HttpTransportConfig};
pub use storage::{
    NewPeer, Peer, PeerFlags, SecretDirection, Storage, StorageError, SyncCursor, SyncDirection,
};
pub use sync::{
    CacheMirror, CycleReport, EntityKind, EntityPayload, MemoryCacheMirror, MirrorSynchronizer,
    PageOutcome, ReconciliationEngine, RemotePage, RunReport, SqliteCacheMirror, SyncCycle,
    SyncDomain, SyncExporter, SyncOrchestrator, SyncableEntity,
};
