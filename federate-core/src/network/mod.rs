// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network Module
//!
//! Transport abstraction for pulling pages from peers and hydrating lookup
//! definitions, with an HTTP implementation and scripted mocks.

mod error;
#[cfg(feature = "http")]
mod http;
mod mock;
mod transport;

pub use error::NetworkError;
#[cfg(feature = "http")]
pub use http::{HttpLookupSource, HttpPeerTransport, HttpTransportConfig};
pub use mock::{MockLookupSource, MockPeerTransport, MockResponse, RecordedRequest};
pub use transport::{LookupSource, PageRequest, PeerTransport, TransportResult};
