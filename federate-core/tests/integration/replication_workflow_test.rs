// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Replication Workflow Integration Tests
//!
//! Node A pulls node B's locally authored data through the loopback
//! transport and converges on it.

use std::time::Duration;

use federate_core::network::MockLookupSource;
use federate_core::sync::{
    CacheMirror, EntityKind, MemoryCacheMirror, PersonAttribute, SyncDomain, SyncOrchestrator,
    SyncableEntity,
};
use federate_core::{FixedClock, SyncConfig};

use crate::common::fixtures::{author_persons, link, mode, node, person};
use crate::common::loopback::LoopbackTransport;

fn named(token: &str, updated: i64, name: &str) -> SyncableEntity {
    SyncableEntity::person(
        token,
        updated,
        PersonAttribute {
            first_name: Some(name.to_string()),
            ..PersonAttribute::default()
        },
    )
}

fn config() -> SyncConfig {
    SyncConfig::default()
        .with_domains(vec![SyncDomain::Persons, SyncDomain::Modes])
        .with_page_limit(3)
        .with_overlap_buffer(Duration::from_millis(10))
}

/// Test: a first pull copies every locally authored row of the server
#[tokio::test]
async fn test_full_pull_converges() {
    let a = node("net-a");
    let b = node("net-b");
    link(&a, "net-a", &b, "net-b", "k-ab");

    author_persons(&b, "p", 100, 7);
    b.record_local_entity(&mode("p0", "solo", 200), 1).unwrap();
    b.record_local_entity(&mode("p3", "kids", 201), 1).unwrap();

    let transport = LoopbackTransport::new().serve("net-b", &b);
    let mirror = MemoryCacheMirror::new();
    let orchestrator = SyncOrchestrator::new(
        &a,
        transport,
        MockLookupSource::new(),
        &mirror,
        Box::new(FixedClock::new(10_000)),
        config(),
        "net-a",
    );

    let report = orchestrator.run_once().await.unwrap();
    assert_eq!(report.failed(), 0);
    assert_eq!(report.inserted(), 9);

    assert_eq!(a.count_rows(EntityKind::PersonAttribute).unwrap(), 7);
    assert_eq!(a.count_rows(EntityKind::ModeAssignment).unwrap(), 2);

    let projection = mirror.load("p3").unwrap().unwrap();
    assert!(projection.contains_key("mode_assignment:kids"));
}

/// Test: replicated rows are not re-exported to third nodes
#[tokio::test]
async fn test_only_home_node_exports() {
    let a = node("net-a");
    let b = node("net-b");
    let c = node("net-c");
    link(&a, "net-a", &b, "net-b", "k-ab");
    link(&c, "net-c", &a, "net-a", "k-ca");

    author_persons(&b, "b", 100, 2);

    let mirror = MemoryCacheMirror::new();
    let pull_ab = SyncOrchestrator::new(
        &a,
        LoopbackTransport::new().serve("net-b", &b),
        MockLookupSource::new(),
        &mirror,
        Box::new(FixedClock::new(10_000)),
        config(),
        "net-a",
    );
    pull_ab.run_once().await.unwrap();
    assert_eq!(a.count_rows(EntityKind::PersonAttribute).unwrap(), 2);

    let pull_ca = SyncOrchestrator::new(
        &c,
        LoopbackTransport::new().serve("net-a", &a),
        MockLookupSource::new(),
        &mirror,
        Box::new(FixedClock::new(10_000)),
        config(),
        "net-c",
    );
    let report = pull_ca.run_once().await.unwrap();
    assert_eq!(report.failed(), 0);
    assert_eq!(c.count_rows(EntityKind::PersonAttribute).unwrap(), 0);
}

/// Test: pulling twice yields the same state and no writes the second time
#[tokio::test]
async fn test_repeated_pull_is_idempotent() {
    let a = node("net-a");
    let b = node("net-b");
    link(&a, "net-a", &b, "net-b", "k-ab");
    author_persons(&b, "p", 100, 5);

    let mirror = MemoryCacheMirror::new();
    let orchestrator = SyncOrchestrator::new(
        &a,
        LoopbackTransport::new().serve("net-b", &b),
        MockLookupSource::new(),
        &mirror,
        Box::new(FixedClock::new(10_000)),
        config().with_skip_cursor_check(),
        "net-a",
    );

    let first = orchestrator.run_once().await.unwrap();
    assert_eq!(first.inserted(), 5);
    let snapshot: Vec<_> = (0..5)
        .map(|i| a.owner_rows(&format!("p{i}")).unwrap())
        .collect();

    let second = orchestrator.run_once().await.unwrap();
    assert_eq!(second.inserted() + second.updated(), 0);
    let again: Vec<_> = (0..5)
        .map(|i| a.owner_rows(&format!("p{i}")).unwrap())
        .collect();
    assert_eq!(snapshot, again);
}

/// Test: a local row with the same timestamp survives; a newer remote wins
#[tokio::test]
async fn test_timestamp_tie_keeps_local() {
    let a = node("net-a");
    let b = node("net-b");
    link(&a, "net-a", &b, "net-b", "k-ab");

    let mirror = MemoryCacheMirror::new();
    let pull = || {
        SyncOrchestrator::new(
            &a,
            LoopbackTransport::new().serve("net-b", &b),
            MockLookupSource::new(),
            &mirror,
            Box::new(FixedClock::new(10_000)),
            SyncConfig::default()
                .with_domains(vec![SyncDomain::Persons])
                .with_skip_cursor_check(),
            "net-a",
        )
    };

    a.record_local_entity(&named("tok_A", 1_000, "local"), 1).unwrap();
    b.record_local_entity(&named("tok_A", 1_000, "remote"), 1).unwrap();

    let report = pull().run_once().await.unwrap();
    assert_eq!(report.cycle("net-b", SyncDomain::Persons).unwrap().skipped, 1);
    let row = a
        .entity_row(EntityKind::PersonAttribute, "tok_A", "tok_A")
        .unwrap()
        .unwrap();
    assert!(row.payload.contains("\"local\""));

    b.record_local_entity(&named("tok_A", 1_001, "remote-new"), 2)
        .unwrap();
    pull().run_once().await.unwrap();
    let row = a
        .entity_row(EntityKind::PersonAttribute, "tok_A", "tok_A")
        .unwrap()
        .unwrap();
    assert_eq!(row.updated, 1_001);
    assert!(row.payload.contains("remote-new"));
}

/// Test: a tombstone on the home node removes the field from the mirror
#[tokio::test]
async fn test_tombstone_propagates_to_mirror() {
    let a = node("net-a");
    let b = node("net-b");
    link(&a, "net-a", &b, "net-b", "k-ab");
    b.record_local_entity(&person("tok_A", 100), 1).unwrap();
    b.record_local_entity(&mode("tok_A", "solo", 110), 1).unwrap();

    let mirror = MemoryCacheMirror::new();
    let run = |now: i64| {
        SyncOrchestrator::new(
            &a,
            LoopbackTransport::new().serve("net-b", &b),
            MockLookupSource::new(),
            &mirror,
            Box::new(FixedClock::new(now)),
            config(),
            "net-a",
        )
    };

    run(10_000).run_once().await.unwrap();
    assert!(mirror
        .load("tok_A")
        .unwrap()
        .unwrap()
        .contains_key("mode_assignment:solo"));

    b.record_local_entity(&mode("tok_A", "solo", 20_000).tombstoned(20_000), 2)
        .unwrap();
    run(30_000).run_once().await.unwrap();

    let projection = mirror.load("tok_A").unwrap().unwrap();
    assert!(!projection.contains_key("mode_assignment:solo"));
    assert!(projection.contains_key("person_attribute:tok_A"));
}
