// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

// Delta extraction over cumulative snapshots.
//
// Upstream does not send increments: every record carries the full
// answer-so-far. `DeltaTracker` holds the latest sanitized snapshot
// and turns each new one into the minimal text the client must append.

use crate::sanitize::AnswerSanitizer;
use std::sync::Arc;

/// What a new cumulative snapshot meant for the client.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOutcome {
    /// Snapshot identical to the buffer; nothing changed.
    Unchanged,
    /// The buffer advanced, but the delta was empty or consisted only
    /// of whitespace-equivalent tokens. Nothing is forwarded: an
    /// invisible delta must never surface as a blank line client-side.
    Swallowed,
    /// Forward this text verbatim.
    Emit(String),
}

/// Per-call cumulative buffer. One instance per relay call; never
/// shared, even between calls of the same client session.
pub struct DeltaTracker {
    sanitizer: Arc<AnswerSanitizer>,
    clean: String,
}

impl DeltaTracker {
    pub fn new(sanitizer: Arc<AnswerSanitizer>) -> Self {
        Self {
            sanitizer,
            clean: String::new(),
        }
    }

    /// The latest cumulative sanitized snapshot seen so far.
    pub fn buffer(&self) -> &str {
        &self.clean
    }

    /// True until the first non-empty snapshot arrives. The caller
    /// applies leading-token stripping while this holds.
    pub fn is_empty(&self) -> bool {
        self.clean.is_empty()
    }

    /// Fold a new cumulative sanitized snapshot into the buffer.
    ///
    /// The normal case is a prefix extension: the delta is the suffix
    /// beyond the current buffer. When the snapshot does not extend
    /// the buffer, upstream rewrote earlier content; the full snapshot
    /// is resent as the delta. That can duplicate text on the client;
    /// it is a known upstream quirk, deliberately not papered over
    /// with a diff because the rewrite semantics are unconfirmed.
    pub fn advance(&mut self, snapshot: String) -> DeltaOutcome {
        if snapshot == self.clean {
            return DeltaOutcome::Unchanged;
        }

        let delta = if snapshot.starts_with(self.clean.as_str()) {
            snapshot[self.clean.len()..].to_string()
        } else {
            snapshot.clone()
        };

        self.clean = snapshot;

        if delta.is_empty() || self.sanitizer.is_whitespace_only(&delta) {
            DeltaOutcome::Swallowed
        } else {
            DeltaOutcome::Emit(delta)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> DeltaTracker {
        DeltaTracker::new(Arc::new(AnswerSanitizer::new()))
    }

    #[test]
    fn first_snapshot_emitted_in_full() {
        let mut t = tracker();
        assert_eq!(
            t.advance("Hello".to_string()),
            DeltaOutcome::Emit("Hello".to_string())
        );
        assert_eq!(t.buffer(), "Hello");
    }

    #[test]
    fn prefix_extension_emits_suffix() {
        let mut t = tracker();
        t.advance("Hello".to_string());
        assert_eq!(
            t.advance("Hello world".to_string()),
            DeltaOutcome::Emit(" world".to_string())
        );
        assert_eq!(t.buffer(), "Hello world");
    }

    #[test]
    fn identical_snapshot_is_unchanged() {
        let mut t = tracker();
        t.advance("Hello".to_string());
        assert_eq!(t.advance("Hello".to_string()), DeltaOutcome::Unchanged);
        assert_eq!(t.buffer(), "Hello");
    }

    #[test]
    fn prefix_mismatch_resends_full_snapshot() {
        let mut t = tracker();
        t.advance("Hello world".to_string());
        assert_eq!(
            t.advance("Goodbye".to_string()),
            DeltaOutcome::Emit("Goodbye".to_string())
        );
        assert_eq!(t.buffer(), "Goodbye");
    }

    #[test]
    fn whitespace_only_delta_swallowed_but_buffer_advances() {
        let mut t = tracker();
        t.advance("Hello".to_string());
        assert_eq!(
            t.advance("Hello<br>\n".to_string()),
            DeltaOutcome::Swallowed
        );
        assert_eq!(t.buffer(), "Hello<br>\n");

        // The next delta is computed against the advanced buffer.
        assert_eq!(
            t.advance("Hello<br>\nmore".to_string()),
            DeltaOutcome::Emit("more".to_string())
        );
    }

    #[test]
    fn nbsp_and_zero_width_delta_swallowed() {
        let mut t = tracker();
        t.advance("x".to_string());
        assert_eq!(
            t.advance("x\u{00A0}\u{200B}&nbsp;".to_string()),
            DeltaOutcome::Swallowed
        );
    }

    #[test]
    fn concatenated_deltas_reconstruct_final_text() {
        let snapshots = [
            "The",
            "The quick",
            "The quick brown",
            "The quick brown fox jumps",
            "The quick brown fox jumps over the lazy dog.",
        ];
        let mut t = tracker();
        let mut rebuilt = String::new();
        for snap in snapshots {
            if let DeltaOutcome::Emit(delta) = t.advance(snap.to_string()) {
                rebuilt.push_str(&delta);
            }
        }
        assert_eq!(rebuilt, snapshots[snapshots.len() - 1]);
        assert_eq!(t.buffer(), snapshots[snapshots.len() - 1]);
    }

    #[test]
    fn rewrite_to_empty_is_swallowed_and_resets_buffer() {
        let mut t = tracker();
        t.advance("Hello".to_string());
        assert_eq!(t.advance(String::new()), DeltaOutcome::Swallowed);
        assert!(t.is_empty());
    }
}
