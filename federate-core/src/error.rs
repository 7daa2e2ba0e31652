// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Crate-level error type.

use thiserror::Error;

use crate::auth::AuthError;
use crate::network::NetworkError;
use crate::storage::StorageError;
use crate::sync::{MirrorError, ReconcileError};

/// Any failure of a sync unit.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Cache mirror error: {0}")]
    Mirror(#[from] MirrorError),
}

pub type SyncResult<T> = Result<T, SyncError>;
