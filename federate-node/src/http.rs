// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! HTTP Server for the Sync and Lookup Endpoints
//!
//! Peers pull pages from `/sync/{domain}` after passing the inbound gate.
//! Catalog definitions this node holds are served from `/lookups`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use federate_core::storage::{LookupKey, LookupKind};
use federate_core::sync::{ExportQuery, SyncExporter};
use federate_core::{AuthError, InboundAuthGate, InboundCredentials, Peer, Storage, SyncDomain};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub storage: Arc<Mutex<Storage>>,
    pub start_time: Instant,
    pub max_page_limit: usize,
}

impl HttpState {
    fn storage(&self) -> MutexGuard<'_, Storage> {
        self.storage.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

fn error_response(status: StatusCode, reason: &str) -> Response {
    (status, Json(serde_json::json!({ "error": reason }))).into_response()
}

fn auth_rejection(err: &AuthError) -> Response {
    let status = match err {
        AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        e if e.is_unauthenticated() => StatusCode::UNAUTHORIZED,
        _ => StatusCode::FORBIDDEN,
    };
    error_response(status, err.reason())
}

/// Middleware authenticating the calling peer from the query string.
///
/// On success the resolved [`Peer`] is attached to the request.
async fn auth_gate_middleware(
    State(state): State<HttpState>,
    mut request: Request,
    next: Next,
) -> Response {
    let credentials = Query::<InboundCredentials>::try_from_uri(request.uri())
        .map(|Query(c)| c)
        .unwrap_or_default();

    let result = {
        let storage = state.storage();
        InboundAuthGate::new(&storage).authenticate(&credentials)
    };

    match result {
        Ok(peer) => {
            request.extensions_mut().insert(peer);
            next.run(request).await
        }
        Err(e) => {
            match &e {
                AuthError::Storage(inner) => error!(error = %inner, "Gate lookup failed"),
                _ => warn!(
                    network = credentials.network_token.as_deref().unwrap_or_default(),
                    reason = e.reason(),
                    "Rejected sync request"
                ),
            }
            auth_rejection(&e)
        }
    }
}

/// Creates the HTTP router with the health, sync and lookup endpoints.
pub fn create_router(state: HttpState) -> Router {
    let gated = Router::new()
        .route("/sync/:domain", get(sync_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_gate_middleware,
        ));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/lookups/:kind/:token", get(lookup_handler))
        .merge(gated)
        .with_state(state)
}

/// Root handler - returns basic info.
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "federate-node",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/sync/{domain}", "/lookups/{kind}/{token}"]
    }))
}

/// Health check endpoint - always returns 200 if server is running.
async fn health_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime,
    })
}

/// Serves one page of locally authored rows to an authenticated peer.
async fn sync_handler(
    State(state): State<HttpState>,
    Extension(peer): Extension<Peer>,
    Path(domain): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let Some(domain) = SyncDomain::parse(&domain) else {
        return error_response(StatusCode::NOT_FOUND, "unknown_domain");
    };

    let page = {
        let storage = state.storage();
        SyncExporter::new(&storage)
            .with_max_page_limit(state.max_page_limit)
            .page(domain, &query)
    };

    match page {
        Ok(page) => {
            debug!(
                network = %peer.network_token,
                domain = %domain,
                items = page.items.len(),
                has_more = page.has_more(),
                "Served sync page"
            );
            Json(page).into_response()
        }
        Err(e) => {
            error!(network = %peer.network_token, domain = %domain, error = %e, "Export failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}

/// Serves a stored catalog definition.
async fn lookup_handler(
    State(state): State<HttpState>,
    Path((kind, token)): Path<(String, String)>,
) -> Response {
    let Some(kind) = LookupKind::parse(&kind) else {
        return error_response(StatusCode::NOT_FOUND, "unknown_lookup_kind");
    };

    let definition = state.storage().lookup(&LookupKey::new(kind, token));
    match definition {
        Ok(Some(definition)) => Json(definition).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found"),
        Err(e) => {
            error!(error = %e, "Lookup read failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}
