// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Test fixtures: nodes, peer links and entities.

use federate_core::storage::{NewPeer, Peer, PeerFlags, SecretDirection, Storage};
use federate_core::sync::{EntityPayload, ModeAssignment, PersonAttribute, SyncableEntity};

/// Creates an in-memory node registered as itself under `token`.
pub fn node(token: &str) -> Storage {
    let storage = Storage::in_memory().unwrap();
    storage
        .register_peer(&NewPeer::local(token, &format!("https://{token}.example")))
        .unwrap();
    storage
}

/// Lets `puller` pull from `server` with `secret`.
///
/// Registers each node on the other side and installs the secret as the
/// puller's outbound and the server's inbound credential. Returns the
/// server as seen by the puller.
pub fn link(
    puller: &Storage,
    puller_token: &str,
    server: &Storage,
    server_token: &str,
    secret: &str,
) -> Peer {
    let flags = PeerFlags {
        keys_exchanged: true,
        ..PeerFlags::default()
    };

    let remote = puller
        .register_peer(
            &NewPeer::remote(server_token, &format!("https://{server_token}.example"))
                .with_flags(flags),
        )
        .unwrap();
    puller
        .rotate_secret(remote.id, SecretDirection::To, secret)
        .unwrap();

    let caller = server
        .register_peer(
            &NewPeer::remote(puller_token, &format!("https://{puller_token}.example"))
                .with_flags(flags),
        )
        .unwrap();
    server
        .rotate_secret(caller.id, SecretDirection::From, secret)
        .unwrap();

    remote
}

pub fn person(token: &str, updated: i64) -> SyncableEntity {
    SyncableEntity::person(
        token,
        updated,
        PersonAttribute {
            first_name: Some(format!("name-{token}")),
            ..PersonAttribute::default()
        },
    )
}

pub fn mode(person: &str, mode: &str, updated: i64) -> SyncableEntity {
    SyncableEntity::new(
        person,
        mode,
        updated,
        EntityPayload::ModeAssignment(ModeAssignment {
            mode_token: mode.to_string(),
            is_active: true,
        }),
    )
}

/// Authors `count` persons on `storage` with `updated` = base, base + 1, ...
pub fn author_persons(storage: &Storage, prefix: &str, base: i64, count: usize) {
    for i in 0..count {
        storage
            .record_local_entity(&person(&format!("{prefix}{i}"), base + i as i64), 1)
            .unwrap();
    }
}
