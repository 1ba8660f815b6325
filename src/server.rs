// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

// HTTP surface.
//
// Responsibilities:
// - POST /chat: validate, resolve the session, open the upstream
//   completions stream, and answer with the relayed SSE stream
// - GET /: landing page with the configured preset questions
// - GET /healthz: liveness probe
// - Error mapping: validation -> 400, session/connect failures -> 502;
//   failures after streaming starts are in-band SSE error frames

use crate::config::Config;
use crate::relay::StreamRelay;
use crate::sanitize::AnswerSanitizer;
use crate::session::{SessionError, SessionResolver, SessionStore};
use crate::upstream::{UpstreamApi, UpstreamError};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// The landing page template, embedded at compile time.
const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced before the SSE stream starts. Anything after the
/// first byte is reported in-band by the relay instead.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("session creation failed: {0}")]
    Session(#[from] SessionError),

    #[error("upstream request failed: {0}")]
    Connect(UpstreamError),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, public_message) = match &self {
            ChatError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ChatError::Session(e) => (
                StatusCode::BAD_GATEWAY,
                format!("session creation failed: {e}"),
            ),
            ChatError::Connect(e) => (
                StatusCode::BAD_GATEWAY,
                format!("upstream request failed: {e}"),
            ),
        };
        (status, public_message).into_response()
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state injected into axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: Arc<dyn UpstreamApi>,
    pub resolver: Arc<SessionResolver>,
    pub sanitizer: Arc<AnswerSanitizer>,
    templates: Arc<minijinja::Environment<'static>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        upstream: Arc<dyn UpstreamApi>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let mut templates = minijinja::Environment::new();
        templates
            .add_template("index.html", INDEX_TEMPLATE)
            .expect("embedded landing template is invalid");

        Self {
            resolver: Arc::new(SessionResolver::new(store, upstream.clone())),
            sanitizer: Arc::new(AnswerSanitizer::new()),
            templates: Arc::new(templates),
            config,
            upstream,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Landing page: preset questions rendered into the embedded template.
pub async fn index(State(state): State<AppState>) -> Response {
    let rendered = state
        .templates
        .get_template("index.html")
        .and_then(|t| {
            t.render(minijinja::context! {
                preset_questions => state.config.preset_questions
            })
        });

    match rendered {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render landing page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to render landing page",
            )
                .into_response()
        }
    }
}

/// Liveness probe: GET /healthz -> 200 OK
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Chat endpoint.
///
/// Validates `{question, session_id}`, resolves the upstream session,
/// opens the completions stream, and hands the relayed frame stream to
/// the client as SSE. Once streaming starts, failures are in-band.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ChatError> {
    let question = body
        .get("question")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    let session_id = body
        .get("session_id")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    if question.is_empty() || session_id.is_empty() {
        return Err(ChatError::Validation(
            "question and session_id are required".to_string(),
        ));
    }

    let upstream_session = state.resolver.resolve(&session_id).await?;

    tracing::info!(
        client_session = %session_id,
        upstream_session = %upstream_session,
        question_chars = question.chars().count(),
        "chat stream opening"
    );

    let upstream_stream = state
        .upstream
        .completions_stream(&question, &upstream_session, &state.config.lang)
        .await
        .map_err(ChatError::Connect)?;

    let relay = StreamRelay::new(state.sanitizer.clone(), state.config.upstream.base_url());
    let frames = relay
        .relay(upstream_stream)
        .map(|b| Ok::<Bytes, std::io::Error>(b));

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache, no-transform")
        .header(header::CONNECTION, "keep-alive")
        // Nginx in front must not buffer the stream.
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(frames))
        .unwrap();

    Ok(response)
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the axum router. All collaborators arrive through `AppState`:
/// no side effects, no hard-coded clients.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/chat", post(chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, Environment};
    use crate::session::InMemorySessionStore;
    use crate::upstream::UpstreamByteStream;
    use async_trait::async_trait;
    use axum::http::Request;
    use bytes::Bytes;
    use tower::ServiceExt; // for oneshot

    // -----------------------------------------------------------------------
    // Mock upstream
    // -----------------------------------------------------------------------

    /// Scripted upstream: a canned session body (None -> transport
    /// failure) and canned completions lines (None -> connect failure).
    struct MockUpstream {
        session_body: Option<serde_json::Value>,
        answer_lines: Option<Vec<String>>,
    }

    #[async_trait]
    impl UpstreamApi for MockUpstream {
        async fn create_session(&self) -> Result<serde_json::Value, UpstreamError> {
            match &self.session_body {
                Some(body) => Ok(body.clone()),
                None => Err(UpstreamError::Transport("connection refused".to_string())),
            }
        }

        async fn completions_stream(
            &self,
            _question: &str,
            _session_id: &str,
            _lang: &str,
        ) -> Result<UpstreamByteStream, UpstreamError> {
            match &self.answer_lines {
                Some(lines) => {
                    let chunks: Vec<Result<Bytes, UpstreamError>> = lines
                        .iter()
                        .map(|l| Ok(Bytes::from(format!("{l}\n"))))
                        .collect();
                    Ok(Box::pin(tokio_stream::iter(chunks)))
                }
                None => Err(UpstreamError::Status(503)),
            }
        }
    }

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            environment: Environment::Testing,
            secret_key: config::DEFAULT_SECRET_KEY.to_string(),
            upstream: crate::config::UpstreamConfig {
                host: "http://rag.local".to_string(),
                port: "80".to_string(),
                api_key: "test-key".to_string(),
                agent_id: "agent-1".to_string(),
            },
            lang: "English".to_string(),
            preset_questions: vec![
                "What is the first preset?".to_string(),
                "What is the second preset?".to_string(),
            ],
        })
    }

    fn app_with(upstream: MockUpstream) -> Router {
        let state = AppState::new(
            test_config(),
            Arc::new(upstream),
            Arc::new(InMemorySessionStore::new()),
        );
        build_router(state)
    }

    fn happy_upstream() -> MockUpstream {
        MockUpstream {
            session_body: Some(serde_json::json!({"data": {"id": "rag-1"}})),
            answer_lines: Some(vec![
                format!("data: {}", serde_json::json!({"data": {"answer": "Hello"}})),
                format!("data: {}", serde_json::json!({"data": {"answer": "Hello world"}})),
            ]),
        }
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn empty_question_returns_400() {
        let app = app_with(happy_upstream());
        let resp = app
            .oneshot(chat_request(r#"{"question":"   ","session_id":"s1"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_session_id_returns_400() {
        let app = app_with(happy_upstream());
        let resp = app
            .oneshot(chat_request(r#"{"question":"hi","session_id":""}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_fields_return_400() {
        let app = app_with(happy_upstream());
        let resp = app.oneshot(chat_request(r#"{}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    // -----------------------------------------------------------------------
    // Session failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn session_body_without_data_id_returns_502() {
        let app = app_with(MockUpstream {
            session_body: Some(serde_json::json!({"data": {}})),
            answer_lines: Some(vec![]),
        });
        let resp = app
            .oneshot(chat_request(r#"{"question":"hi","session_id":"s1"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = body_string(resp).await;
        assert!(body.contains("data.id"), "detail should name the field: {body}");
    }

    #[tokio::test]
    async fn unreachable_upstream_returns_502() {
        let app = app_with(MockUpstream {
            session_body: None,
            answer_lines: Some(vec![]),
        });
        let resp = app
            .oneshot(chat_request(r#"{"question":"hi","session_id":"s1"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn completions_connect_failure_returns_502() {
        let app = app_with(MockUpstream {
            session_body: Some(serde_json::json!({"data": {"id": "rag-1"}})),
            answer_lines: None,
        });
        let resp = app
            .oneshot(chat_request(r#"{"question":"hi","session_id":"s1"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    // -----------------------------------------------------------------------
    // Streaming happy path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn successful_chat_streams_sse() {
        let app = app_with(happy_upstream());
        let resp = app
            .oneshot(chat_request(r#"{"question":"hi","session_id":"s1"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        assert_eq!(
            resp.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache, no-transform"
        );
        assert_eq!(resp.headers().get("x-accel-buffering").unwrap(), "no");

        let body = body_string(resp).await;
        assert!(body.contains(r#"data: {"type":"delta","text":"Hello"}"#));
        assert!(body.contains(r#"data: {"type":"delta","text":" world"}"#));
        assert!(body.trim_end().ends_with(r#"data: {"type":"done"}"#));
    }

    // -----------------------------------------------------------------------
    // Landing page and health
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn landing_page_lists_preset_questions() {
        let app = app_with(happy_upstream());
        let resp = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_string(resp).await;
        assert!(body.contains("What is the first preset?"));
        assert!(body.contains("What is the second preset?"));
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = app_with(happy_upstream());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
