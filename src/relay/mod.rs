// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

// Upstream-to-client stream translation, the core of the relay.
//
// Responsibilities:
// - Split the upstream completions byte stream into `data:` records
// - Sanitize each cumulative answer snapshot (spinner glyphs, think
//   blocks, status lines, exotic whitespace, leading break markup)
// - Convert cumulative snapshots into incremental deltas, swallowing
//   whitespace-only deltas
// - Emit the reference-document list at most once per call
// - Heartbeat on idle lines; terminate with one `done` or `error` frame

mod delta;
mod processor;
mod refs;
mod types;

pub use delta::{DeltaOutcome, DeltaTracker};
pub use processor::StreamRelay;
pub use refs::{escape_html, parse_reference_chunks, render_reference_list};
pub use types::{ReferenceChunk, RelayEvent, HEARTBEAT_FRAME};
