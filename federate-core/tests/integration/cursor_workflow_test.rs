// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cursor Workflow Integration Tests
//!
//! The cursor only moves after a clean cycle, and the overlap buffer keeps
//! consecutive cycles from missing rows stamped slightly in the past.

use std::time::Duration;

use federate_core::network::{MockLookupSource, MockPeerTransport};
use federate_core::storage::Storage;
use federate_core::sync::{EntityKind, MemoryCacheMirror, RemotePage, SyncDomain, SyncOrchestrator};
use federate_core::{FixedClock, SyncConfig};

use crate::common::fixtures::{author_persons, link, mode, node, person};
use crate::common::loopback::LoopbackTransport;

fn persons_config(limit: usize, overlap: Duration) -> SyncConfig {
    SyncConfig::default()
        .with_domains(vec![SyncDomain::Persons])
        .with_page_limit(limit)
        .with_overlap_buffer(overlap)
}

fn cursor_of(a: &Storage, peer_token: &str, domain: SyncDomain) -> Option<i64> {
    let peer = a.peer_by_token(peer_token).unwrap().unwrap();
    a.cursor(peer.id, domain)
        .unwrap()
        .map(|c| c.last_synchronized)
}

/// Test: a failure mid-cycle leaves the previous watermark in place
#[tokio::test]
async fn test_cursor_all_or_nothing() {
    let a = node("net-a");
    let b = node("net-b");
    link(&a, "net-a", &b, "net-b", "k-ab");
    author_persons(&b, "p", 1_000, 6);

    let mirror = MemoryCacheMirror::new();
    let transport = LoopbackTransport::new().serve("net-b", &b);
    transport.fail_at(2);

    let orchestrator = SyncOrchestrator::new(
        &a,
        transport,
        MockLookupSource::new(),
        &mirror,
        Box::new(FixedClock::new(20_000)),
        persons_config(2, Duration::ZERO),
        "net-a",
    );

    let report = orchestrator.run_once().await.unwrap();
    let cycle = report.cycle("net-b", SyncDomain::Persons).unwrap();
    assert!(cycle.is_failed());
    assert!(!cycle.advanced);
    // The first page was applied and stays applied.
    assert_eq!(a.count_rows(EntityKind::PersonAttribute).unwrap(), 2);
    assert_eq!(cursor_of(&a, "net-b", SyncDomain::Persons), None);

    // The next pass starts over from the same point and completes.
    let report = orchestrator.run_once().await.unwrap();
    let cycle = report.cycle("net-b", SyncDomain::Persons).unwrap();
    assert!(cycle.advanced);
    assert_eq!(cycle.skipped, 2);
    assert_eq!(cycle.inserted, 4);
    assert_eq!(cursor_of(&a, "net-b", SyncDomain::Persons), Some(20_000));
}

/// Test: rows stamped just before the previous cycle start are still seen
#[tokio::test]
async fn test_overlap_covers_late_rows() {
    for (overlap, expect_seen) in [(Duration::from_millis(10), true), (Duration::ZERO, false)] {
        let a = node("net-a");
        let b = node("net-b");
        link(&a, "net-a", &b, "net-b", "k-ab");
        b.record_local_entity(&person("early", 5_000), 1).unwrap();

        let mirror = MemoryCacheMirror::new();
        let run = |now: i64| {
            SyncOrchestrator::new(
                &a,
                LoopbackTransport::new().serve("net-b", &b),
                MockLookupSource::new(),
                &mirror,
                Box::new(FixedClock::new(now)),
                persons_config(100, overlap),
                "net-a",
            )
        };

        run(10_000).run_once().await.unwrap();
        assert_eq!(cursor_of(&a, "net-b", SyncDomain::Persons), Some(10_000));

        // Committed on B after A's cycle started, stamped by a clock 5ms behind.
        b.record_local_entity(&person("late", 9_995), 2).unwrap();
        run(20_000).run_once().await.unwrap();

        let seen = a
            .entity_row(EntityKind::PersonAttribute, "late", "late")
            .unwrap()
            .is_some();
        assert_eq!(seen, expect_seen, "overlap {:?}", overlap);
    }
}

/// Test: one invalid entity holds the cursor back; valid ones still apply
#[tokio::test]
async fn test_invalid_entity_blocks_advance() {
    let a = node("net-a");
    let peer = a
        .register_peer(
            &federate_core::NewPeer::remote("net-p", "https://p.example").with_flags(
                federate_core::PeerFlags {
                    keys_exchanged: true,
                    ..federate_core::PeerFlags::default()
                },
            ),
        )
        .unwrap();
    a.rotate_secret(peer.id, federate_core::SecretDirection::To, "k-ap")
        .unwrap();
    a.record_local_entity(&person("tok_A", 900), 1).unwrap();
    a.advance_cursor(peer.id, SyncDomain::Modes, 1_000, 1_000)
        .unwrap();

    let transport = MockPeerTransport::new();
    let page = RemotePage {
        items: vec![
            mode("tok_A", "m1", 1_050),
            mode("tok_A", "m2", 1_075),
            mode("tok_A", "m3", 1_100),
            mode("tok_Z", "m1", 1_100),
        ],
        pagination_updated: None,
        prev_data_since: Some(1_000),
    };
    transport.push_page("net-p", SyncDomain::Modes, page.clone());
    transport.push_page("net-p", SyncDomain::Modes, page);

    let mirror = MemoryCacheMirror::new();
    let orchestrator = SyncOrchestrator::new(
        &a,
        transport,
        MockLookupSource::new(),
        &mirror,
        Box::new(FixedClock::new(5_000)),
        SyncConfig::default()
            .with_domains(vec![SyncDomain::Modes])
            .with_overlap_buffer(Duration::ZERO),
        "net-a",
    );

    let report = orchestrator.run_once().await.unwrap();
    let cycle = report.cycle("net-p", SyncDomain::Modes).unwrap();
    assert_eq!(cycle.inserted, 3);
    assert_eq!(cycle.invalid, 1);
    assert!(!cycle.advanced);
    assert!(!cycle.is_failed());
    assert_eq!(a.count_rows(EntityKind::ModeAssignment).unwrap(), 3);
    assert_eq!(cursor_of(&a, "net-p", SyncDomain::Modes), Some(1_000));

    // The next cycle asks for the same window again.
    orchestrator.run_once().await.unwrap();
    let requests = orchestrator
        .transport()
        .requests_for("net-p", SyncDomain::Modes);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].data_since, Some(1_000));
    assert_eq!(requests[1].data_since, Some(1_000));
}
