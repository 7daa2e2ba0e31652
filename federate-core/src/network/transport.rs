// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transport Traits
//!
//! Seams between the sync engine and the network: fetching one page from a
//! peer's sync endpoint, and hydrating a catalog definition.

use serde::Serialize;

use super::error::NetworkError;
use crate::storage::{LookupDefinition, LookupKey, Peer};
use crate::sync::{RemotePage, SyncDomain};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, NetworkError>;

/// Query parameters of one sync request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    /// This node's credential for the target peer.
    pub secret_key: String,
    /// This node's own network token.
    pub network_token: String,
    /// Window lower bound; only on the first page, absent on a full sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_since: Option<i64>,
    /// Window lower bound echoed by the first response (page 2+).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_data_since: Option<i64>,
    /// Continuation token from the previous page (page 2+).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_updated: Option<i64>,
    /// Client clock at send time, informational only.
    pub request_sent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl PageRequest {
    /// First request of a cycle.
    pub fn first(
        network_token: &str,
        secret_key: &str,
        data_since: Option<i64>,
        request_sent: i64,
        limit: usize,
    ) -> Self {
        PageRequest {
            secret_key: secret_key.to_string(),
            network_token: network_token.to_string(),
            data_since,
            prev_data_since: None,
            pagination_updated: None,
            request_sent,
            limit: Some(limit),
        }
    }

    /// Follow-up request carrying the window bound and continuation token.
    pub fn next(&self, prev_data_since: Option<i64>, pagination_updated: i64, request_sent: i64) -> Self {
        PageRequest {
            data_since: None,
            prev_data_since,
            pagination_updated: Some(pagination_updated),
            request_sent,
            ..self.clone()
        }
    }

    /// True for the first request of a cycle.
    pub fn is_first(&self) -> bool {
        self.pagination_updated.is_none()
    }
}

/// Fetches pages from a peer's sync endpoint.
///
/// Implementations must bound each request with a timeout and map any
/// non-success status to an error.
#[allow(async_fn_in_trait)]
pub trait PeerTransport {
    async fn fetch_page(
        &self,
        peer: &Peer,
        domain: SyncDomain,
        request: &PageRequest,
    ) -> TransportResult<RemotePage>;
}

/// Authoritative source of catalog definitions.
#[allow(async_fn_in_trait)]
pub trait LookupSource {
    /// Returns `Ok(None)` when the source does not know the key.
    async fn fetch_lookup(&self, key: &LookupKey) -> TransportResult<Option<LookupDefinition>>;
}

/// An absent source knows no keys; only locally cached lookups resolve.
impl<L: LookupSource> LookupSource for Option<L> {
    async fn fetch_lookup(&self, key: &LookupKey) -> TransportResult<Option<LookupDefinition>> {
        match self {
            Some(source) => source.fetch_lookup(key).await,
            None => Ok(None),
        }
    }
}
