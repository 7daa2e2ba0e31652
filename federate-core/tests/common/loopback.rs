// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-process transport answering sync requests from other nodes' stores.
//!
//! Requests pass through the same gate and exporter a node's HTTP endpoint
//! uses, so a pull against a loopback peer exercises both sides.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use federate_core::network::{NetworkError, PageRequest, PeerTransport, TransportResult};
use federate_core::storage::{Peer, Storage};
use federate_core::sync::{ExportQuery, RemotePage, SyncDomain, SyncExporter};
use federate_core::{InboundAuthGate, InboundCredentials};

#[derive(Default)]
pub struct LoopbackTransport<'a> {
    servers: HashMap<String, &'a Storage>,
    max_page_limit: Option<usize>,
    requests: RefCell<Vec<(String, SyncDomain, PageRequest)>>,
    fail_at_request: Cell<Option<usize>>,
}

impl<'a> LoopbackTransport<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves requests addressed to `network_token` from `storage`.
    pub fn serve(mut self, network_token: &str, storage: &'a Storage) -> Self {
        self.servers.insert(network_token.to_string(), storage);
        self
    }

    pub fn with_max_page_limit(mut self, max: usize) -> Self {
        self.max_page_limit = Some(max);
        self
    }

    /// Answers the n-th request (1-based, counted from now) with a 500.
    pub fn fail_at(&self, nth: usize) {
        self.fail_at_request
            .set(Some(self.requests.borrow().len() + nth));
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<(String, SyncDomain, PageRequest)> {
        self.requests.borrow().clone()
    }
}

impl PeerTransport for LoopbackTransport<'_> {
    async fn fetch_page(
        &self,
        peer: &Peer,
        domain: SyncDomain,
        request: &PageRequest,
    ) -> TransportResult<RemotePage> {
        self.requests
            .borrow_mut()
            .push((peer.network_token.clone(), domain, request.clone()));

        if self.fail_at_request.get() == Some(self.requests.borrow().len()) {
            return Err(NetworkError::HttpStatus(500));
        }

        let storage = self
            .servers
            .get(&peer.network_token)
            .ok_or_else(|| NetworkError::ConnectionFailed(peer.api_domain.clone()))?;

        let credentials =
            InboundCredentials::new(&request.network_token, &request.secret_key);
        if let Err(e) = InboundAuthGate::new(storage).authenticate(&credentials) {
            let status = if e.is_unauthenticated() { 401 } else { 403 };
            return Err(NetworkError::HttpStatus(status));
        }

        let mut exporter = SyncExporter::new(storage);
        if let Some(max) = self.max_page_limit {
            exporter = exporter.with_max_page_limit(max);
        }
        let page = exporter
            .page(domain, &ExportQuery::from(request))
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;

        // Through JSON, as over the wire.
        let body = serde_json::to_vec(&page)?;
        Ok(serde_json::from_slice(&body)?)
    }
}
