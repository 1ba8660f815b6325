// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

// Upstream RAG provider client.
//
// The relay talks to a RagFlow-compatible agent API: one call to
// create a conversation session, one long-lived streaming call per
// question. Handlers depend on the `UpstreamApi` trait and receive the
// concrete client via `Arc`, so tests can substitute their own.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;

/// Session creation is a small control call and fails fast.
pub const SESSION_CREATE_TIMEOUT_SECS: u64 = 100;

/// RAG generation is slow; the completions call must be allowed to
/// stream for minutes.
pub const COMPLETIONS_TIMEOUT_SECS: u64 = 600;

/// The upstream completions body as a stream of raw byte chunks.
pub type UpstreamByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

/// Errors from talking to the upstream provider.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request timed out: {0}")]
    Timeout(String),

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("upstream response is not valid JSON: {0}")]
    Decode(String),
}

/// Abstraction over the upstream agent API.
///
/// Implementations must be Send + Sync so they can be shared across
/// request handlers via `Arc`.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Create a new upstream conversation session and return the raw
    /// response body. The caller extracts the created identifier.
    async fn create_session(&self) -> Result<serde_json::Value, UpstreamError>;

    /// Open the streaming completions call for one question.
    async fn completions_stream(
        &self,
        question: &str,
        session_id: &str,
        lang: &str,
    ) -> Result<UpstreamByteStream, UpstreamError>;
}

// ---------------------------------------------------------------------------
// Reqwest implementation
// ---------------------------------------------------------------------------

/// `UpstreamApi` backed by a shared `reqwest::Client` with bearer auth.
pub struct RagflowClient {
    client: reqwest::Client,
    base_url: String,
    agent_id: String,
    api_key: String,
}

impl RagflowClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        agent_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            agent_id: agent_id.into(),
            api_key: api_key.into(),
        }
    }

    fn sessions_url(&self) -> String {
        format!("{}/api/v1/agents/{}/sessions", self.base_url, self.agent_id)
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/api/v1/agents/{}/completions",
            self.base_url, self.agent_id
        )
    }
}

fn transport_error(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout(e.to_string())
    } else {
        UpstreamError::Transport(e.to_string())
    }
}

#[async_trait]
impl UpstreamApi for RagflowClient {
    async fn create_session(&self) -> Result<serde_json::Value, UpstreamError> {
        let resp = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({}))
            .timeout(Duration::from_secs(SESSION_CREATE_TIMEOUT_SECS))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        resp.json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn completions_stream(
        &self,
        question: &str,
        session_id: &str,
        lang: &str,
    ) -> Result<UpstreamByteStream, UpstreamError> {
        let payload = serde_json::json!({
            "question": question,
            "stream": true,
            "session_id": session_id,
            "lang": lang,
        });

        let resp = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(COMPLETIONS_TIMEOUT_SECS))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let stream = resp.bytes_stream().map_err(transport_error);
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_agent_api_layout() {
        let client = RagflowClient::new(
            reqwest::Client::new(),
            "http://rag.local:80",
            "agent-7",
            "key",
        );
        assert_eq!(
            client.sessions_url(),
            "http://rag.local:80/api/v1/agents/agent-7/sessions"
        );
        assert_eq!(
            client.completions_url(),
            "http://rag.local:80/api/v1/agents/agent-7/completions"
        );
    }
}
