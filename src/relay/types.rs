// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

// Client-facing stream event types.
//
// Every event crosses the wire as one SSE frame: `data: {json}\n\n`.
// The frame set is fixed: any number of `delta` frames, at most one
// `refs` frame, then exactly one terminal `done` or `error` frame.
// Heartbeats are SSE comment frames and carry no payload.

use serde::Serialize;

/// SSE comment frame sent on idle upstream lines. Keeps intermediary
/// proxies and browsers from timing the connection out.
pub const HEARTBEAT_FRAME: &str = ":\n\n";

/// One translated event for the browser client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayEvent {
    /// Incremental answer text the client should append verbatim.
    Delta { text: String },
    /// Rendered reference-document list, sent at most once per call.
    Refs { html: String },
    /// Normal end of stream.
    Done,
    /// Stream failed mid-flight; the stream closes after this frame.
    Error { message: String },
}

impl RelayEvent {
    /// Render this event as a complete SSE data frame.
    pub fn to_sse_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"event serialization failed"}"#.to_string()
        });
        format!("data: {json}\n\n")
    }
}

/// One reference document attached to an answer, as reported by the
/// upstream `reference.chunks` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceChunk {
    pub document_id: String,
    pub document_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_frame_shape() {
        let frame = RelayEvent::Delta {
            text: " world".to_string(),
        }
        .to_sse_frame();
        assert_eq!(frame, "data: {\"type\":\"delta\",\"text\":\" world\"}\n\n");
    }

    #[test]
    fn done_frame_shape() {
        let frame = RelayEvent::Done.to_sse_frame();
        assert_eq!(frame, "data: {\"type\":\"done\"}\n\n");
    }

    #[test]
    fn error_frame_carries_message() {
        let frame = RelayEvent::Error {
            message: "connection reset".to_string(),
        }
        .to_sse_frame();
        assert!(frame.starts_with("data: "));
        assert!(frame.contains("\"type\":\"error\""));
        assert!(frame.contains("connection reset"));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn non_ascii_text_survives_serialization() {
        let frame = RelayEvent::Delta {
            text: "答案".to_string(),
        }
        .to_sse_frame();
        assert!(frame.contains("答案"));
    }
}
