// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Federate Node
//!
//! A network node serving its locally authored data to peers over HTTP and
//! pulling theirs on a schedule:
//! - `/sync/{domain}` behind the inbound authentication gate
//! - `/lookups/{kind}/{token}` for catalog definitions
//! - a scheduler thread driving the sync orchestrator

pub mod config;
pub mod http;
pub mod scheduler;

use federate_core::{NewPeer, Storage, StorageError};
use tracing::{info, warn};

/// Registers this node's own peer record on first start.
///
/// A record under a different token is left alone and reported.
pub fn ensure_self_peer(
    storage: &Storage,
    network_token: &str,
    public_url: &str,
) -> Result<(), StorageError> {
    match storage.self_peer()? {
        Some(existing) if existing.network_token == network_token => Ok(()),
        Some(existing) => {
            warn!(
                configured = network_token,
                stored = %existing.network_token,
                "Stored self network differs from configuration"
            );
            Ok(())
        }
        None => {
            let peer = storage.register_peer(&NewPeer::local(network_token, public_url))?;
            info!(network = %peer.network_token, "Registered self network");
            Ok(())
        }
    }
}
