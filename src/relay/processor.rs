// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

// Stream relay.
//
// Consumes the upstream completions byte stream, splits it into lines,
// parses `data: {json}` records, and drives the sanitize → strip →
// delta pipeline per record. Translated events are pushed into a
// bounded channel; the HTTP layer drains the channel into the SSE
// response. One relay task per chat call, no state shared across calls.

use super::delta::{DeltaOutcome, DeltaTracker};
use super::refs::{parse_reference_chunks, render_reference_list};
use super::types::{RelayEvent, HEARTBEAT_FRAME};
use crate::sanitize::AnswerSanitizer;
use crate::upstream::UpstreamError;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// Translates one upstream completions stream into client events.
///
/// Construction is cheap; the sanitizer is shared. `doc_base` is the
/// upstream origin used for reference-document links.
pub struct StreamRelay {
    sanitizer: Arc<AnswerSanitizer>,
    doc_base: String,
}

impl StreamRelay {
    pub fn new(sanitizer: Arc<AnswerSanitizer>, doc_base: impl Into<String>) -> Self {
        Self {
            sanitizer,
            doc_base: doc_base.into(),
        }
    }

    /// Run the relay over an upstream byte stream, producing the SSE
    /// frame stream for the client.
    ///
    /// Terminates with exactly one `done` frame (upstream exhausted) or
    /// one `error` frame (upstream failed mid-stream). If the client
    /// disconnects, channel sends fail and the task stops reading,
    /// dropping the upstream stream and releasing its connection.
    pub fn relay(
        &self,
        mut input: impl Stream<Item = Result<Bytes, UpstreamError>> + Unpin + Send + 'static,
    ) -> impl Stream<Item = Bytes> {
        let (tx, rx) = mpsc::channel::<Bytes>(64);
        let doc_base = self.doc_base.clone();
        let mut state = RelayState::new(self.sanitizer.clone());

        tokio::spawn(async move {
            loop {
                match input.next().await {
                    Some(Ok(chunk)) => {
                        state
                            .line_buffer
                            .push_str(&String::from_utf8_lossy(&chunk));
                        if drain_lines(&mut state, &doc_base, &tx).await.is_err() {
                            return; // Client disconnected
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "upstream stream failed mid-relay");
                        let _ = send_event(
                            &tx,
                            &RelayEvent::Error {
                                message: e.to_string(),
                            },
                        )
                        .await;
                        return;
                    }
                    None => break,
                }
            }

            // Flush a final partial line (upstream may omit the
            // trailing newline).
            if !state.line_buffer.is_empty() {
                let line = std::mem::take(&mut state.line_buffer);
                if process_line(&line, &mut state, &doc_base, &tx).await.is_err() {
                    return;
                }
            }

            let _ = send_event(&tx, &RelayEvent::Done).await;
        });

        ReceiverStream::new(rx)
    }
}

// ---------------------------------------------------------------------------
// Per-call state
// ---------------------------------------------------------------------------

/// Mutable state carried through one relay call.
struct RelayState {
    sanitizer: Arc<AnswerSanitizer>,
    /// Partial line buffer (bytes between newlines).
    line_buffer: String,
    /// Cumulative sanitized answer buffer.
    tracker: DeltaTracker,
    /// Emitted-once guard for the reference side channel.
    refs_sent: bool,
}

impl RelayState {
    fn new(sanitizer: Arc<AnswerSanitizer>) -> Self {
        Self {
            tracker: DeltaTracker::new(sanitizer.clone()),
            sanitizer,
            line_buffer: String::new(),
            refs_sent: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Line processing
// ---------------------------------------------------------------------------

/// Drain all complete lines from the buffer and process each one.
async fn drain_lines(
    state: &mut RelayState,
    doc_base: &str,
    tx: &mpsc::Sender<Bytes>,
) -> Result<(), ()> {
    while let Some(newline_pos) = state.line_buffer.find('\n') {
        let line = state.line_buffer[..newline_pos].to_string();
        state.line_buffer = state.line_buffer[newline_pos + 1..].to_string();
        process_line(&line, state, doc_base, tx).await?;
    }
    Ok(())
}

/// Process a single upstream line.
///
/// Blank lines become heartbeats. Lines without the `data:` marker are
/// ignored. A record that fails to parse, or lacks a `data` object, is
/// skipped without aborting the stream.
async fn process_line(
    line: &str,
    state: &mut RelayState,
    doc_base: &str,
    tx: &mpsc::Sender<Bytes>,
) -> Result<(), ()> {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return tx
            .send(Bytes::from(HEARTBEAT_FRAME))
            .await
            .map_err(|_| ());
    }

    let Some(payload) = trimmed.strip_prefix("data:") else {
        return Ok(());
    };

    let record: serde_json::Value = match serde_json::from_str(payload.trim()) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed upstream record");
            return Ok(());
        }
    };

    let Some(data) = record.get("data").filter(|d| d.is_object()) else {
        return Ok(());
    };

    // Answer text: sanitize the cumulative snapshot, strip leading
    // padding tokens until the buffer has first content, then extract
    // the delta. Empty snapshots never reach the tracker: a
    // reference-only record must not register as a rewrite to empty.
    let raw_answer = data.get("answer").and_then(|a| a.as_str()).unwrap_or("");
    let mut clean = state.sanitizer.sanitize(raw_answer);
    if state.tracker.is_empty() {
        clean = state.sanitizer.strip_leading_tokens(&clean);
    }
    if !clean.is_empty() {
        match state.tracker.advance(clean) {
            DeltaOutcome::Emit(text) => {
                send_event(tx, &RelayEvent::Delta { text }).await?;
            }
            DeltaOutcome::Unchanged | DeltaOutcome::Swallowed => {}
        }
    }

    // Reference side channel, at most once per call.
    if !state.refs_sent {
        let chunks = parse_reference_chunks(data);
        if !chunks.is_empty() {
            let html = render_reference_list(&chunks, doc_base);
            state.refs_sent = true;
            send_event(tx, &RelayEvent::Refs { html }).await?;
        }
    }

    Ok(())
}

/// Send one translated event as an SSE frame.
async fn send_event(tx: &mpsc::Sender<Bytes>, event: &RelayEvent) -> Result<(), ()> {
    tx.send(Bytes::from(event.to_sse_frame()))
        .await
        .map_err(|_| ())
}
