// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Authentication Workflow Integration Tests
//!
//! Pulls rejected by the serving node's gate fail the cycle without
//! touching the puller's state.

use federate_core::network::MockLookupSource;
use federate_core::storage::{NewPeer, PeerFlags, SecretDirection, Storage};
use federate_core::sync::{EntityKind, MemoryCacheMirror, SyncDomain, SyncOrchestrator};
use federate_core::{FixedClock, InboundAuthGate, InboundCredentials, SyncConfig};

use crate::common::fixtures::{author_persons, link, node};
use crate::common::loopback::LoopbackTransport;

async fn pull(a: &Storage, b: &Storage) -> federate_core::RunReport {
    let mirror = MemoryCacheMirror::new();
    SyncOrchestrator::new(
        a,
        LoopbackTransport::new().serve("net-b", b),
        MockLookupSource::new(),
        &mirror,
        Box::new(FixedClock::new(10_000)),
        SyncConfig::default().with_domains(vec![SyncDomain::Persons]),
        "net-a",
    )
    .run_once()
    .await
    .unwrap()
}

fn assert_rejected(a: &Storage, report: &federate_core::RunReport, status: &str) {
    let cycle = report.cycle("net-b", SyncDomain::Persons).unwrap();
    assert!(
        cycle.error.as_deref().unwrap_or_default().contains(status),
        "{:?}",
        cycle.error
    );
    assert!(!cycle.advanced);
    assert_eq!(a.count_rows(EntityKind::PersonAttribute).unwrap(), 0);
    let peer = a.peer_by_token("net-b").unwrap().unwrap();
    assert!(a.cursor(peer.id, SyncDomain::Persons).unwrap().is_none());
}

/// Test: a mismatched secret is refused with 403
#[tokio::test]
async fn test_wrong_secret_refused() {
    let a = node("net-a");
    let b = node("net-b");
    let remote = link(&a, "net-a", &b, "net-b", "k-ab");
    author_persons(&b, "p", 100, 3);

    a.rotate_secret(remote.id, SecretDirection::To, "guess")
        .unwrap();
    let report = pull(&a, &b).await;
    assert_rejected(&a, &report, "403");
}

/// Test: a puller blocked by the server is refused with 403
#[tokio::test]
async fn test_blocked_puller_refused() {
    let a = node("net-a");
    let b = node("net-b");
    link(&a, "net-a", &b, "net-b", "k-ab");
    author_persons(&b, "p", 100, 3);

    let caller = b.peer_by_token("net-a").unwrap().unwrap();
    b.set_peer_flags(
        caller.id,
        PeerFlags {
            is_blocked: true,
            keys_exchanged: true,
            ..PeerFlags::default()
        },
    )
    .unwrap();

    let report = pull(&a, &b).await;
    assert_rejected(&a, &report, "403");
}

/// Test: a server that does not know the puller refuses it
#[tokio::test]
async fn test_unknown_puller_refused() {
    let a = node("net-a");
    let b = node("net-b");
    author_persons(&b, "p", 100, 3);

    // A knows B, B has never registered A.
    let remote = a
        .register_peer(
            &NewPeer::remote("net-b", "https://net-b.example").with_flags(PeerFlags {
                keys_exchanged: true,
                ..PeerFlags::default()
            }),
        )
        .unwrap();
    a.rotate_secret(remote.id, SecretDirection::To, "k-ab")
        .unwrap();

    let report = pull(&a, &b).await;
    assert_rejected(&a, &report, "403");
}

/// Test: after a secret rotation on the server only the new secret works
#[tokio::test]
async fn test_rotation_requires_new_secret() {
    let a = node("net-a");
    let b = node("net-b");
    let remote = link(&a, "net-a", &b, "net-b", "k-ab");
    author_persons(&b, "p", 100, 2);

    let caller = b.peer_by_token("net-a").unwrap().unwrap();
    b.rotate_secret(caller.id, SecretDirection::From, "k-ab-2")
        .unwrap();

    let report = pull(&a, &b).await;
    assert_rejected(&a, &report, "403");

    a.rotate_secret(remote.id, SecretDirection::To, "k-ab-2")
        .unwrap();
    let report = pull(&a, &b).await;
    let cycle = report.cycle("net-b", SyncDomain::Persons).unwrap();
    assert!(cycle.advanced);
    assert_eq!(a.count_rows(EntityKind::PersonAttribute).unwrap(), 2);
}

/// Test: the gate's decisions over every credential combination
#[test]
fn test_gate_matrix() {
    let a = node("net-a");
    let b = node("net-b");
    link(&a, "net-a", &b, "net-b", "k-ab");
    let gate = InboundAuthGate::new(&b);

    let cases: Vec<(Option<&str>, Option<&str>, Result<(), &str>)> = vec![
        (Some("net-a"), Some("k-ab"), Ok(())),
        (None, Some("k-ab"), Err("missing_network_token")),
        (Some(""), Some("k-ab"), Err("missing_network_token")),
        (Some("net-a"), None, Err("missing_secret_key")),
        (Some("net-x"), Some("k-ab"), Err("unknown_network")),
        (Some("net-a"), Some("k-ab "), Ok(())),
        (Some("net-a"), Some("k-ba"), Err("invalid_secret_key")),
        (Some("net-b"), Some("k-ab"), Err("network_blocked")),
    ];

    for (token, secret, expected) in cases {
        let credentials = InboundCredentials {
            network_token: token.map(String::from),
            secret_key: secret.map(String::from),
        };
        let result = gate.authenticate(&credentials);
        match expected {
            Ok(()) => assert_eq!(result.unwrap().network_token, "net-a"),
            Err(reason) => assert_eq!(result.unwrap_err().reason(), reason, "{:?}", credentials),
        }
    }
}
