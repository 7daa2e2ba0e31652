// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Node Configuration
//!
//! Read from `FEDERATE_*` environment variables on startup. Unset variables
//! keep their defaults; malformed values are rejected.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use federate_core::sync::DEFAULT_MAX_PAGE_LIMIT;
use federate_core::{SyncConfig, SyncDomain};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Missing required variable {0}")]
    Missing(&'static str),
}

/// Runtime configuration of a node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Directory holding the store and the cache mirror.
    pub data_dir: PathBuf,
    /// This node's own network token.
    pub network_token: String,
    /// Public base URL of this node, recorded on its self peer.
    pub public_url: String,
    /// Base URL of the lookup catalog; hydration is disabled when unset.
    pub lookup_url: Option<String>,
    /// Pause between orchestrator passes.
    pub sync_interval: Duration,
    /// Largest page this node serves.
    pub max_page_limit: usize,
    /// Orchestrator settings.
    pub sync: SyncConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("./data"),
            network_token: String::new(),
            public_url: "http://localhost:8080".to_string(),
            lookup_url: None,
            sync_interval: Duration::from_secs(60),
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
            sync: SyncConfig::default(),
        }
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn parse_bool(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}

fn parse_domains(name: &'static str, value: String) -> Result<Vec<SyncDomain>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            SyncDomain::parse(s).ok_or_else(|| ConfigError::Invalid {
                name,
                value: s.to_string(),
            })
        })
        .collect()
}

impl NodeConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `var`, which returns a variable's value
    /// if it is set.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = var("FEDERATE_LISTEN_ADDR") {
            config.listen_addr = parse("FEDERATE_LISTEN_ADDR", v)?;
        }
        if let Some(v) = var("FEDERATE_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        config.network_token = var("FEDERATE_NETWORK_TOKEN")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("FEDERATE_NETWORK_TOKEN"))?;
        if let Some(v) = var("FEDERATE_PUBLIC_URL") {
            config.public_url = v.trim().trim_end_matches('/').to_string();
        }
        config.lookup_url = var("FEDERATE_LOOKUP_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if let Some(v) = var("FEDERATE_SYNC_INTERVAL_SECS") {
            config.sync_interval = Duration::from_secs(parse("FEDERATE_SYNC_INTERVAL_SECS", v)?);
        }
        if let Some(v) = var("FEDERATE_MAX_PAGE_LIMIT") {
            config.max_page_limit = parse::<usize>("FEDERATE_MAX_PAGE_LIMIT", v)?.max(1);
        }

        let mut sync = SyncConfig::default();
        if let Some(v) = var("FEDERATE_PAGE_LIMIT") {
            sync = sync.with_page_limit(parse("FEDERATE_PAGE_LIMIT", v)?);
        }
        if let Some(v) = var("FEDERATE_OVERLAP_MS") {
            sync = sync.with_overlap_buffer(Duration::from_millis(parse("FEDERATE_OVERLAP_MS", v)?));
        }
        if let Some(v) = var("FEDERATE_REQUEST_TIMEOUT_SECS") {
            sync = sync.with_request_timeout(Duration::from_secs(parse(
                "FEDERATE_REQUEST_TIMEOUT_SECS",
                v,
            )?));
        }
        if let Some(v) = var("FEDERATE_SKIP_CURSOR_CHECK") {
            if parse_bool("FEDERATE_SKIP_CURSOR_CHECK", v)? {
                sync = sync.with_skip_cursor_check();
            }
        }
        if let Some(v) = var("FEDERATE_DOMAINS") {
            sync = sync.with_domains(parse_domains("FEDERATE_DOMAINS", v)?);
        }
        config.sync = sync;

        Ok(config)
    }

    /// Path of the relational store.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("federate.db")
    }

    /// Path of the cache mirror database.
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cache.db")
    }
}
