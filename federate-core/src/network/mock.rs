// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mock transports for testing.
//!
//! Responses are scripted per (network, domain) and consumed in order; every
//! request is recorded for later inspection.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::error::NetworkError;
use super::transport::{LookupSource, PageRequest, PeerTransport, TransportResult};
use crate::storage::{LookupDefinition, LookupKey, Peer};
use crate::sync::{RemotePage, SyncDomain};

/// A scripted reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Page(RemotePage),
    Status(u16),
    Timeout,
}

/// A request the mock received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub network_token: String,
    pub domain: SyncDomain,
    pub request: PageRequest,
}

/// Scripted [`PeerTransport`].
///
/// When a (network, domain) script runs out, an empty final page is returned.
#[derive(Debug, Default)]
pub struct MockPeerTransport {
    scripts: Mutex<HashMap<(String, SyncDomain), VecDeque<MockResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockPeerTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next request to `network_token`/`domain`.
    pub fn push(&self, network_token: &str, domain: SyncDomain, response: MockResponse) {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry((network_token.to_string(), domain))
            .or_default()
            .push_back(response);
    }

    /// Queues a page.
    pub fn push_page(&self, network_token: &str, domain: SyncDomain, page: RemotePage) {
        self.push(network_token, domain, MockResponse::Page(page));
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Requests received for one (network, domain).
    pub fn requests_for(&self, network_token: &str, domain: SyncDomain) -> Vec<PageRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.network_token == network_token && r.domain == domain)
            .map(|r| r.request)
            .collect()
    }

    pub fn clear_requests(&self) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl PeerTransport for MockPeerTransport {
    async fn fetch_page(
        &self,
        peer: &Peer,
        domain: SyncDomain,
        request: &PageRequest,
    ) -> TransportResult<RemotePage> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                network_token: peer.network_token.clone(),
                domain,
                request: request.clone(),
            });

        let next = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&(peer.network_token.clone(), domain))
            .and_then(|queue| queue.pop_front());

        match next {
            Some(MockResponse::Page(page)) => Ok(page),
            Some(MockResponse::Status(status)) => Err(NetworkError::HttpStatus(status)),
            Some(MockResponse::Timeout) => Err(NetworkError::Timeout),
            None => Ok(RemotePage {
                items: Vec::new(),
                pagination_updated: None,
                prev_data_since: request.data_since.or(request.prev_data_since),
            }),
        }
    }
}

/// In-memory [`LookupSource`].
#[derive(Debug, Default)]
pub struct MockLookupSource {
    definitions: Mutex<HashMap<LookupKey, LookupDefinition>>,
    unavailable: Mutex<bool>,
    fetched: Mutex<Vec<LookupKey>>,
}

impl MockLookupSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, definition: LookupDefinition) {
        self.definitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(definition.key(), definition);
    }

    /// Makes every fetch fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap_or_else(|e| e.into_inner()) = unavailable;
    }

    /// Keys requested so far.
    pub fn fetched(&self) -> Vec<LookupKey> {
        self.fetched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl LookupSource for MockLookupSource {
    async fn fetch_lookup(&self, key: &LookupKey) -> TransportResult<Option<LookupDefinition>> {
        self.fetched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.clone());

        if *self.unavailable.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(NetworkError::ConnectionFailed("lookup source down".into()));
        }

        Ok(self
            .definitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }
}
