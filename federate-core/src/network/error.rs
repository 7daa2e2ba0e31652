// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network error types.

use thiserror::Error;

/// Errors talking to a peer or lookup source.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Transport-level failure (DNS, TLS, connection reset, ...).
    #[cfg(feature = "http")]
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The request exceeded its timeout.
    #[error("Request timed out")]
    Timeout,

    /// The peer answered with a non-success status.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The peer violated the pagination protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No active outbound secret for the peer.
    #[error("No active secret for network {0}")]
    MissingCredentials(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl From<serde_json::Error> for NetworkError {
    fn from(e: serde_json::Error) -> Self {
        NetworkError::InvalidResponse(e.to_string())
    }
}
