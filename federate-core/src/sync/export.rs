// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Page Exporter
//!
//! Serving side of the sync endpoint: builds the page this node returns to
//! an authenticated peer. Only locally authored rows are exported, so data
//! is always pulled from its home node.

use serde::Deserialize;

use crate::network::PageRequest;
use crate::storage::{Storage, StorageError};

use super::entity::{RemotePage, SyncDomain};

/// Largest page served regardless of the requested limit.
pub const DEFAULT_MAX_PAGE_LIMIT: usize = 1_000;

/// Window and continuation parameters of an inbound sync request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub data_since: Option<i64>,
    #[serde(default)]
    pub prev_data_since: Option<i64>,
    #[serde(default)]
    pub pagination_updated: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl From<&PageRequest> for ExportQuery {
    fn from(request: &PageRequest) -> Self {
        ExportQuery {
            data_since: request.data_since,
            prev_data_since: request.prev_data_since,
            pagination_updated: request.pagination_updated,
            limit: request.limit,
        }
    }
}

/// Builds outbound pages from the local store.
pub struct SyncExporter<'a> {
    storage: &'a Storage,
    max_page_limit: usize,
}

impl<'a> SyncExporter<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        SyncExporter {
            storage,
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
        }
    }

    pub fn with_max_page_limit(mut self, max: usize) -> Self {
        self.max_page_limit = max.max(1);
        self
    }

    /// Returns rows with `updated` above the window bound (or the
    /// continuation token, whichever is later), oldest first.
    ///
    /// A page never ends in the middle of a timestamp: rows sharing the
    /// last row's `updated` are appended, so the continuation token can be
    /// used as an exclusive lower bound.
    pub fn page(&self, domain: SyncDomain, query: &ExportQuery) -> Result<RemotePage, StorageError> {
        let kind = domain.kind();
        let window = query.prev_data_since.or(query.data_since);
        let after = window
            .unwrap_or(i64::MIN)
            .max(query.pagination_updated.unwrap_or(i64::MIN));
        let limit = query
            .limit
            .unwrap_or(self.max_page_limit)
            .clamp(1, self.max_page_limit);

        let mut rows = self.storage.local_rows_after(kind, after, limit + 1)?;

        let mut pagination_updated = None;
        if rows.len() > limit {
            rows.truncate(limit);
            if let Some(last) = rows.last().cloned() {
                rows.extend(self.storage.local_rows_at(kind, last.updated, last.id)?);
                let more = self.storage.local_rows_after(kind, last.updated, 1)?;
                if !more.is_empty() {
                    pagination_updated = Some(last.updated);
                }
            }
        }

        let items = rows
            .iter()
            .map(|row| row.to_entity())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RemotePage {
            items,
            pagination_updated,
            prev_data_since: window,
        })
    }
}
