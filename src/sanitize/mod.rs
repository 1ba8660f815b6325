// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

// Answer text sanitation.
//
// The upstream agent streams *cumulative* answer snapshots that carry
// terminal noise: spinner glyphs, "... is running" status lines,
// internal <think> blocks, exotic whitespace, and stacked <br> markup.
// `AnswerSanitizer` is a pure string transformation applied to every
// snapshot before delta extraction. It is idempotent: sanitizing
// already-sanitized content returns the same result.

use regex::Regex;

/// Spinner, bullet, and ellipsis glyphs the upstream leaks into answers.
const SPINNER_GLYPHS: &str = "◐◓◑◒⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏●○◌◎·•…";

/// Pure answer-text sanitizer. Patterns are compiled once at
/// construction; the instance is shared across request handlers via
/// `Arc` (all methods take `&self`).
pub struct AnswerSanitizer {
    running_line: Regex,
    spinner_runs: Regex,
    think_block: Regex,
    think_block_escaped: Regex,
    zero_width: Regex,
    line_separators: Regex,
    newline_runs: Regex,
    leading_ws: Regex,
    leading_break_tokens: Regex,
    soft_break_runs: Regex,
    ws_only: Regex,
}

impl AnswerSanitizer {
    /// Compile the fixed pattern set. Panics on invalid regex (these
    /// are our own patterns).
    pub fn new() -> Self {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .unwrap_or_else(|e| panic!("sanitizer pattern failed to compile: {e}"))
        };

        Self {
            running_line: compile(r"(?mi)^[^\n]*\bis running\b[^\n]*\n?"),
            spinner_runs: compile(&format!("[{SPINNER_GLYPHS}]+")),
            think_block: compile(r"(?is)<\s*think\b[^>]*>.*?<\s*/\s*think\s*>"),
            think_block_escaped: compile(r"(?is)&lt;\s*think\b[^&]*&gt;.*?&lt;\s*/\s*think\s*&gt;"),
            zero_width: compile("[\u{200B}\u{200C}\u{200D}\u{FEFF}]"),
            line_separators: compile("[\u{2028}\u{2029}]"),
            newline_runs: compile(r"\n{3,}"),
            leading_ws: compile(r"^\s+"),
            leading_break_tokens: compile("(?i)^(?:\\s*(?:<br\\s*/?>|&nbsp;|\u{3000}))+"),
            soft_break_runs: compile(r"(?i)(?:\s*(?:<br\s*/?>|\r?\n)\s*){3,}"),
            ws_only: compile(
                "(?i)^(?:[\\s\u{00A0}\u{202F}\u{200B}\u{200C}\u{200D}\u{FEFF}]|<br\\s*/?>|&nbsp;|\u{3000})+$",
            ),
        }
    }

    /// Sanitize one cumulative answer snapshot.
    ///
    /// Total and deterministic: never fails, empty input yields empty
    /// output. Steps run in a fixed order: the leading-strip passes
    /// assume the noise removal before them.
    pub fn sanitize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        // Transient status lines and terminal glyphs.
        let text = self.running_line.replace_all(raw, "");
        let text = self.spinner_runs.replace_all(&text, "");

        // Thinking blocks, both literal and entity-escaped.
        let text = self.think_block.replace_all(&text, "");
        let text = self.think_block_escaped.replace_all(&text, "");

        // Whitespace-equivalents: NBSP variants become plain spaces,
        // zero-width characters vanish, line/paragraph separators
        // become newlines.
        let text = text.replace('\u{00A0}', " ").replace('\u{202F}', " ");
        let text = self.zero_width.replace_all(&text, "");
        let text = self.line_separators.replace_all(&text, "\n");
        let text = self.newline_runs.replace_all(&text, "\n\n");

        // The first visible character must never sit below a blank
        // line: strip leading whitespace, then leading <br>/&nbsp;/
        // full-width-space stacks, then whatever whitespace the markup
        // strip exposed.
        let text = self.leading_ws.replace(&text, "");
        let text = self.leading_break_tokens.replace(&text, "");
        let text = self.leading_ws.replace(&text, "");

        // 3+ stacked soft breaks (tags or newlines) collapse to one
        // blank line.
        self.soft_break_runs.replace_all(&text, "\n\n").into_owned()
    }

    /// Strip every leading whitespace-equivalent token from `s`.
    ///
    /// Applied to snapshots while the per-call buffer is still empty:
    /// upstream snapshots frequently open with invisible padding, and
    /// the first rendered character must not be preceded by it.
    pub fn strip_leading_tokens(&self, s: &str) -> String {
        if s.is_empty() {
            return String::new();
        }

        let text = s.replace('\u{00A0}', " ").replace('\u{202F}', " ");
        let text = self.zero_width.replace_all(&text, "");
        let text = self.line_separators.replace_all(&text, "\n");

        let text = self.leading_ws.replace(&text, "");
        let text = self.leading_break_tokens.replace(&text, "");
        self.leading_ws.replace(&text, "").into_owned()
    }

    /// Whether `s` consists entirely of whitespace-equivalent tokens:
    /// whitespace, NBSP/NNBSP, zero-width characters, `<br>` tags,
    /// `&nbsp;` entities, or full-width spaces, in any combination.
    /// The empty string is not whitespace-only (there is nothing to
    /// suppress).
    pub fn is_whitespace_only(&self, s: &str) -> bool {
        self.ws_only.is_match(s)
    }
}

impl Default for AnswerSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
