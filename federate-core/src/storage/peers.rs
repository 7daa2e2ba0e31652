// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Peer registry and credential storage.
//!
//! Peers and secrets are provisioned by the key-exchange process; the sync
//! subsystem only reads them.

use rusqlite::{params, OptionalExtension, Row};

use super::{Storage, StorageError};
use crate::clock::current_timestamp_millis;

/// A remote (or the local) network node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: i64,
    pub network_token: String,
    /// Base URL of the node's API, without trailing slash.
    pub api_domain: String,
    pub is_self: bool,
    pub is_online: bool,
    pub is_blocked: bool,
    pub keys_exchanged: bool,
}

impl Peer {
    /// Returns true if this node may pull from the peer.
    pub fn is_outbound_eligible(&self) -> bool {
        !self.is_self && self.is_online && !self.is_blocked && self.keys_exchanged
    }

    /// Returns true if the peer may call this node.
    pub fn is_inbound_eligible(&self) -> bool {
        !self.is_self && !self.is_blocked && self.keys_exchanged
    }
}

/// Values for registering a peer.
#[derive(Debug, Clone)]
pub struct NewPeer {
    pub network_token: String,
    pub api_domain: String,
    pub is_self: bool,
    pub flags: PeerFlags,
}

impl NewPeer {
    pub fn remote(network_token: &str, api_domain: &str) -> Self {
        NewPeer {
            network_token: network_token.to_string(),
            api_domain: api_domain.trim_end_matches('/').to_string(),
            is_self: false,
            flags: PeerFlags::default(),
        }
    }

    pub fn local(network_token: &str, api_domain: &str) -> Self {
        NewPeer {
            is_self: true,
            ..Self::remote(network_token, api_domain)
        }
    }

    pub fn with_flags(mut self, flags: PeerFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Administrator-managed peer flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerFlags {
    pub is_online: bool,
    pub is_blocked: bool,
    pub keys_exchanged: bool,
}

impl Default for PeerFlags {
    fn default() -> Self {
        PeerFlags {
            is_online: true,
            is_blocked: false,
            keys_exchanged: false,
        }
    }
}

/// Which side of a peer relationship a secret authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretDirection {
    /// Sent by this node when calling the peer.
    To,
    /// Required of the peer when it calls this node.
    From,
}

impl SecretDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretDirection::To => "to",
            SecretDirection::From => "from",
        }
    }
}

/// Direction of a sync relationship, for eligibility filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// This node pulls from the peer.
    Outbound,
    /// The peer pulls from this node.
    Inbound,
}

const PEER_COLUMNS: &str =
    "id, network_token, api_domain, is_self, is_online, is_blocked, keys_exchanged";

fn row_to_peer(row: &Row<'_>) -> rusqlite::Result<Peer> {
    Ok(Peer {
        id: row.get(0)?,
        network_token: row.get(1)?,
        api_domain: row.get(2)?,
        is_self: row.get::<_, i32>(3)? != 0,
        is_online: row.get::<_, i32>(4)? != 0,
        is_blocked: row.get::<_, i32>(5)? != 0,
        keys_exchanged: row.get::<_, i32>(6)? != 0,
    })
}

impl Storage {
    // === Peer Registry ===

    /// Registers a peer. Fails if the network token is already known.
    pub fn register_peer(&self, peer: &NewPeer) -> Result<Peer, StorageError> {
        if self.peer_by_token(&peer.network_token)?.is_some() {
            return Err(StorageError::AlreadyExists(peer.network_token.clone()));
        }
        if peer.is_self && self.self_peer()?.is_some() {
            return Err(StorageError::AlreadyExists("self network".into()));
        }

        let now = current_timestamp_millis();
        self.conn.execute(
            "INSERT INTO networks
             (network_token, api_domain, is_self, is_online, is_blocked, keys_exchanged, created, updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                peer.network_token,
                peer.api_domain,
                peer.is_self as i32,
                peer.flags.is_online as i32,
                peer.flags.is_blocked as i32,
                peer.flags.keys_exchanged as i32,
                now,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.peer(id)?
            .ok_or_else(|| StorageError::NotFound(format!("network {}", id)))
    }

    /// Replaces the administrator flags of a peer.
    pub fn set_peer_flags(&self, peer_id: i64, flags: PeerFlags) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE networks SET is_online = ?1, is_blocked = ?2, keys_exchanged = ?3, updated = ?4
             WHERE id = ?5",
            params![
                flags.is_online as i32,
                flags.is_blocked as i32,
                flags.keys_exchanged as i32,
                current_timestamp_millis(),
                peer_id,
            ],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(format!("network {}", peer_id)));
        }
        Ok(())
    }

    /// Loads a peer by ID.
    pub fn peer(&self, peer_id: i64) -> Result<Option<Peer>, StorageError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {PEER_COLUMNS} FROM networks WHERE id = ?1"),
                params![peer_id],
                row_to_peer,
            )
            .optional()?)
    }

    /// Resolves a peer from its network token.
    pub fn peer_by_token(&self, network_token: &str) -> Result<Option<Peer>, StorageError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {PEER_COLUMNS} FROM networks WHERE network_token = ?1"),
                params![network_token],
                row_to_peer,
            )
            .optional()?)
    }

    /// Returns this node's own network record, if registered.
    pub fn self_peer(&self) -> Result<Option<Peer>, StorageError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {PEER_COLUMNS} FROM networks WHERE is_self = 1 LIMIT 1"),
                [],
                row_to_peer,
            )
            .optional()?)
    }

    /// Lists peers eligible for syncing in the given direction, ordered by ID.
    pub fn eligible_peers(&self, direction: SyncDirection) -> Result<Vec<Peer>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PEER_COLUMNS} FROM networks ORDER BY id"))?;
        let peers = stmt
            .query_map([], row_to_peer)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(peers
            .into_iter()
            .filter(|p| match direction {
                SyncDirection::Outbound => p.is_outbound_eligible(),
                SyncDirection::Inbound => p.is_inbound_eligible(),
            })
            .collect())
    }

    // === Shared Secrets ===

    /// Installs a new active secret for one direction, deactivating the previous one.
    pub fn rotate_secret(
        &self,
        peer_id: i64,
        direction: SecretDirection,
        secret_key: &str,
    ) -> Result<(), StorageError> {
        if secret_key.trim().is_empty() {
            return Err(StorageError::InvalidValue("empty secret key".into()));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE network_secrets SET is_active = 0
             WHERE network_id = ?1 AND direction = ?2 AND is_active = 1",
            params![peer_id, direction.as_str()],
        )?;
        tx.execute(
            "INSERT INTO network_secrets (network_id, direction, secret_key, is_active, created)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![
                peer_id,
                direction.as_str(),
                secret_key,
                current_timestamp_millis()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// The secret this node presents when calling the peer.
    pub fn active_secret_to(&self, peer: &Peer) -> Result<Option<String>, StorageError> {
        self.active_secret(peer.id, SecretDirection::To)
    }

    /// The secret the peer must present when calling this node.
    pub fn active_secret_from(&self, peer: &Peer) -> Result<Option<String>, StorageError> {
        self.active_secret(peer.id, SecretDirection::From)
    }

    fn active_secret(
        &self,
        peer_id: i64,
        direction: SecretDirection,
    ) -> Result<Option<String>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT secret_key FROM network_secrets
                 WHERE network_id = ?1 AND direction = ?2 AND is_active = 1",
                params![peer_id, direction.as_str()],
                |row| row.get(0),
            )
            .optional()?)
    }
}
