// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! HTTP transport for peer sync and lookup hydration.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};

use super::error::NetworkError;
use super::transport::{LookupSource, PageRequest, PeerTransport, TransportResult};
use crate::storage::{LookupDefinition, LookupKey, Peer};
use crate::sync::{RemotePage, SyncDomain};

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Timeout applied to each request.
    pub timeout: Duration,

    /// Connect timeout.
    pub connect_timeout: Duration,

    /// Maximum accepted response body (bytes).
    pub max_response_size: u64,

    /// Proxy URL, if outbound traffic must be routed.
    pub proxy_url: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_response_size: 64 * 1024 * 1024, // 64 MB
            proxy_url: None,
        }
    }
}

impl HttpTransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy_url: String) -> Self {
        self.proxy_url = Some(proxy_url);
        self
    }
}

fn build_client(config: &HttpTransportConfig) -> Result<Client, NetworkError> {
    let mut builder = Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(format!(
            "Federate/{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("0.1.0")
        ));

    if let Some(proxy_url) = &config.proxy_url {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    Ok(builder.build()?)
}

fn map_request_error(e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout
    } else {
        NetworkError::Request(e)
    }
}

async fn read_body(
    response: reqwest::Response,
    max_size: u64,
) -> Result<Vec<u8>, NetworkError> {
    if let Some(len) = response.content_length() {
        if len > max_size {
            return Err(NetworkError::InvalidResponse(format!(
                "body of {} bytes exceeds {}",
                len, max_size
            )));
        }
    }

    let data = response.bytes().await.map_err(map_request_error)?;
    if data.len() as u64 > max_size {
        return Err(NetworkError::InvalidResponse(format!(
            "body of {} bytes exceeds {}",
            data.len(),
            max_size
        )));
    }
    Ok(data.to_vec())
}

/// Pulls pages from `GET {api_domain}/sync/{domain}`.
pub struct HttpPeerTransport {
    client: Client,
    max_response_size: u64,
}

impl HttpPeerTransport {
    pub fn new(config: &HttpTransportConfig) -> Result<Self, NetworkError> {
        Ok(Self {
            client: build_client(config)?,
            max_response_size: config.max_response_size,
        })
    }
}

impl PeerTransport for HttpPeerTransport {
    async fn fetch_page(
        &self,
        peer: &Peer,
        domain: SyncDomain,
        request: &PageRequest,
    ) -> TransportResult<RemotePage> {
        let url = format!("{}/sync/{}", peer.api_domain, domain.as_str());
        let response = self
            .client
            .get(&url)
            .query(request)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(NetworkError::HttpStatus(response.status().as_u16()));
        }

        let body = read_body(response, self.max_response_size).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Hydrates catalog definitions from `GET {base_url}/lookups/{kind}/{token}`.
pub struct HttpLookupSource {
    client: Client,
    base_url: String,
    max_response_size: u64,
}

impl HttpLookupSource {
    pub fn new(base_url: &str, config: &HttpTransportConfig) -> Result<Self, NetworkError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_response_size: config.max_response_size,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the lookup URL with the kind and token each encoded as a
    /// single path segment.
    pub fn lookup_url(&self, key: &LookupKey) -> Result<Url, NetworkError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            NetworkError::ConnectionFailed(format!("invalid lookup URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                NetworkError::ConnectionFailed(format!(
                    "lookup URL {} cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push("lookups")
            .push(key.kind.as_str())
            .push(&key.token);
        Ok(url)
    }
}

impl LookupSource for HttpLookupSource {
    async fn fetch_lookup(&self, key: &LookupKey) -> TransportResult<Option<LookupDefinition>> {
        let url = self.lookup_url(key)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(NetworkError::HttpStatus(response.status().as_u16()));
        }

        let body = read_body(response, self.max_response_size).await?;
        let definition: LookupDefinition = serde_json::from_slice(&body)?;
        if definition.key() != *key {
            return Err(NetworkError::InvalidResponse(format!(
                "asked for {} but received {}",
                key,
                definition.key()
            )));
        }
        Ok(Some(definition))
    }
}
