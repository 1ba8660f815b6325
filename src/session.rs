// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

// Session resolution.
//
// The browser picks an opaque session id; the upstream agent issues its
// own. This module owns the mapping between the two: an injected store
// (not a bare global) plus a resolver that lazily creates the upstream
// session on first use. Entries live for the process lifetime; there
// is no expiry in this design.

use crate::upstream::{UpstreamApi, UpstreamError};
use dashmap::DashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// SessionStore trait
// ---------------------------------------------------------------------------

/// Mapping from client session ids to upstream session ids.
///
/// Implementations must be thread-safe (Send + Sync). The resolver
/// holds `Arc<dyn SessionStore>` and calls from multiple request
/// handlers.
pub trait SessionStore: Send + Sync {
    /// Look up the upstream session id for a client session id.
    fn get(&self, client_session_id: &str) -> Option<String>;

    /// Record a mapping. Overwrites any existing entry.
    fn insert(&self, client_session_id: &str, upstream_session_id: &str);

    /// Number of known sessions (for metrics/testing).
    fn len(&self) -> usize;
}

// ---------------------------------------------------------------------------
// InMemorySessionStore
// ---------------------------------------------------------------------------

/// In-memory session table backed by `DashMap` for concurrent access.
///
/// Suitable for single-instance deployments. For multi-process setups,
/// implement `SessionStore` over an external key-value store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, String>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, client_session_id: &str) -> Option<String> {
        self.sessions
            .get(client_session_id)
            .map(|entry| entry.value().clone())
    }

    fn insert(&self, client_session_id: &str, upstream_session_id: &str) {
        self.sessions
            .insert(client_session_id.to_string(), upstream_session_id.to_string());
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Errors from resolving a client session to an upstream session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("upstream session response is missing data.id: {body}")]
    MissingIdentifier { body: String },

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream protocol error: {0}")]
    Protocol(String),
}

/// Resolves client session ids to upstream session ids, creating the
/// upstream session lazily on first use.
pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
    upstream: Arc<dyn UpstreamApi>,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn SessionStore>, upstream: Arc<dyn UpstreamApi>) -> Self {
        Self { store, upstream }
    }

    /// Return the upstream session id for `client_session_id`.
    ///
    /// A store hit returns immediately with no upstream call. On a
    /// miss, one create-session call is issued and the result cached.
    /// Concurrent misses for the same key are not deduplicated: each
    /// racing caller may create its own upstream session and the table
    /// keeps whichever write lands last. Upstream creation is safe to
    /// repeat, so this is wasteful but not incorrect.
    pub async fn resolve(&self, client_session_id: &str) -> Result<String, SessionError> {
        if let Some(existing) = self.store.get(client_session_id) {
            return Ok(existing);
        }

        let body = self.upstream.create_session().await.map_err(|e| match e {
            UpstreamError::Timeout(msg) | UpstreamError::Transport(msg) => {
                SessionError::Unreachable(msg)
            }
            other => SessionError::Protocol(other.to_string()),
        })?;

        let Some(id) = body
            .get("data")
            .and_then(|d| d.get("id"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
        else {
            return Err(SessionError::MissingIdentifier {
                body: body.to_string(),
            });
        };

        self.store.insert(client_session_id, id);
        tracing::info!(
            client_session = client_session_id,
            upstream_session = id,
            "created upstream session"
        );
        Ok(id.to_string())
    }
}
