// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pagination Workflow Integration Tests
//!
//! Request counts and continuation handling between a puller and the
//! exporter of its peer.

use std::time::Duration;

use federate_core::network::MockLookupSource;
use federate_core::storage::Storage;
use federate_core::sync::{EntityKind, MemoryCacheMirror, SyncDomain, SyncOrchestrator};
use federate_core::{FixedClock, SyncConfig};

use crate::common::fixtures::{author_persons, link, node, person};
use crate::common::loopback::LoopbackTransport;

/// Pulls persons from `b` into `a` with the given page limit; returns the
/// number of requests made.
async fn pull_persons(a: &Storage, b: &Storage, limit: usize) -> usize {
    let mirror = MemoryCacheMirror::new();
    let orchestrator = SyncOrchestrator::new(
        a,
        LoopbackTransport::new().serve("net-b", b),
        MockLookupSource::new(),
        &mirror,
        Box::new(FixedClock::new(100_000)),
        SyncConfig::default()
            .with_domains(vec![SyncDomain::Persons])
            .with_page_limit(limit),
        "net-a",
    );
    let report = orchestrator.run_once().await.unwrap();
    assert_eq!(report.failed(), 0);
    orchestrator.transport().request_count()
}

fn linked() -> (Storage, Storage) {
    let a = node("net-a");
    let b = node("net-b");
    link(&a, "net-a", &b, "net-b", "k-ab");
    (a, b)
}

/// Test: N rows with limit L take ceil(N / L) requests
#[tokio::test]
async fn test_request_count_is_ceiling() {
    for (n, limit) in [(10usize, 3usize), (9, 3), (1, 1000), (7, 1), (1000, 250)] {
        let (a, b) = linked();
        author_persons(&b, "p", 1_000, n);

        let requests = pull_persons(&a, &b, limit).await;
        assert_eq!(requests, n.div_ceil(limit), "n={n} limit={limit}");
        assert_eq!(a.count_rows(EntityKind::PersonAttribute).unwrap(), n);
    }
}

/// Test: an empty peer answers with a single final page
#[tokio::test]
async fn test_empty_peer_single_request() {
    let (a, b) = linked();
    assert_eq!(pull_persons(&a, &b, 10).await, 1);
}

/// Test: rows sharing a timestamp are never split across pages
#[tokio::test]
async fn test_shared_timestamps_not_lost() {
    let (a, b) = linked();
    for i in 0..5 {
        b.record_local_entity(&person(&format!("same{i}"), 500), 1)
            .unwrap();
    }
    author_persons(&b, "later", 600, 3);

    pull_persons(&a, &b, 2).await;
    assert_eq!(a.count_rows(EntityKind::PersonAttribute).unwrap(), 8);
}

/// Test: follow-up requests carry the window bound and the latest token
#[tokio::test]
async fn test_follow_up_requests_carry_window() {
    let (a, b) = linked();
    author_persons(&b, "p", 1_000, 5);
    let peer = a.peer_by_token("net-b").unwrap().unwrap();
    a.advance_cursor(peer.id, SyncDomain::Persons, 900, 900)
        .unwrap();

    let mirror = MemoryCacheMirror::new();
    let orchestrator = SyncOrchestrator::new(
        &a,
        LoopbackTransport::new().serve("net-b", &b),
        MockLookupSource::new(),
        &mirror,
        Box::new(FixedClock::new(100_000)),
        SyncConfig::default()
            .with_domains(vec![SyncDomain::Persons])
            .with_page_limit(2)
            .with_overlap_buffer(Duration::ZERO),
        "net-a",
    );
    orchestrator.run_once().await.unwrap();

    let requests = orchestrator.transport().requests();
    assert_eq!(requests.len(), 3);
    let (_, _, first) = &requests[0];
    assert_eq!(first.data_since, Some(900));
    assert_eq!(first.pagination_updated, None);

    let (_, _, second) = &requests[1];
    assert_eq!(second.data_since, None);
    assert_eq!(second.prev_data_since, Some(900));
    assert_eq!(second.pagination_updated, Some(1_001));
    let (_, _, third) = &requests[2];
    assert_eq!(third.pagination_updated, Some(1_003));
    assert!(third.request_sent >= first.request_sent);
}
