// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Inbound Authentication Gate
//!
//! Verifies that an incoming sync request comes from a known peer that is
//! unblocked and has exchanged keys, presenting the secret this node expects
//! from it. The gate only reads the peer registry.

use serde::Deserialize;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::storage::{Peer, Storage, StorageError};

/// Why a request was rejected.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing network token")]
    MissingNetworkToken,

    #[error("missing secret key")]
    MissingSecretKey,

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("network blocked: {0}")]
    NetworkBlocked(String),

    #[error("invalid secret key for network {0}")]
    InvalidSecretKey(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Stable machine-readable reason, returned to the caller.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingNetworkToken => "missing_network_token",
            AuthError::MissingSecretKey => "missing_secret_key",
            AuthError::UnknownNetwork(_) => "unknown_network",
            AuthError::NetworkBlocked(_) => "network_blocked",
            AuthError::InvalidSecretKey(_) => "invalid_secret_key",
            AuthError::Storage(_) => "internal_error",
        }
    }

    /// True when credentials were absent rather than wrong.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::MissingNetworkToken | AuthError::MissingSecretKey
        )
    }
}

/// Credentials carried by an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InboundCredentials {
    #[serde(default)]
    pub network_token: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl InboundCredentials {
    pub fn new(network_token: &str, secret_key: &str) -> Self {
        InboundCredentials {
            network_token: Some(network_token.to_string()),
            secret_key: Some(secret_key.to_string()),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Checks inbound credentials against the peer registry.
pub struct InboundAuthGate<'a> {
    storage: &'a Storage,
}

impl<'a> InboundAuthGate<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        InboundAuthGate { storage }
    }

    /// Resolves the calling peer or explains why it is rejected.
    pub fn authenticate(&self, credentials: &InboundCredentials) -> Result<Peer, AuthError> {
        let token = present(&credentials.network_token).ok_or(AuthError::MissingNetworkToken)?;
        let secret = present(&credentials.secret_key).ok_or(AuthError::MissingSecretKey)?;

        let peer = self
            .storage
            .peer_by_token(token)?
            .ok_or_else(|| AuthError::UnknownNetwork(token.to_string()))?;

        if !peer.is_inbound_eligible() {
            return Err(AuthError::NetworkBlocked(peer.network_token));
        }

        let expected = self
            .storage
            .active_secret_from(&peer)?
            .ok_or_else(|| AuthError::InvalidSecretKey(peer.network_token.clone()))?;

        if !bool::from(expected.as_bytes().ct_eq(secret.as_bytes())) {
            return Err(AuthError::InvalidSecretKey(peer.network_token));
        }

        Ok(peer)
    }
}
