// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

// Reference-document side channel.
//
// Upstream records may carry a `reference.chunks` list naming the
// documents an answer was grounded on. The relay renders them once per
// call as a ready-to-insert HTML fragment: an unordered list of links
// into the upstream's document viewer.

use super::types::ReferenceChunk;

/// Extract the reference chunks from an upstream `data` object.
/// Absent or malformed entries degrade to defaults rather than failing
/// the record.
pub fn parse_reference_chunks(data: &serde_json::Value) -> Vec<ReferenceChunk> {
    let Some(chunks) = data
        .get("reference")
        .and_then(|r| r.get("chunks"))
        .and_then(|c| c.as_array())
    else {
        return Vec::new();
    };

    chunks
        .iter()
        .map(|chunk| ReferenceChunk {
            document_id: chunk
                .get("document_id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            document_name: chunk
                .get("document_name")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown document")
                .to_string(),
        })
        .collect()
}

/// Render the reference list fragment.
///
/// Chunks are deduplicated by document id (first occurrence wins) and
/// chunks without an id are dropped. Each link points at the upstream
/// document viewer; link text is HTML-escaped.
pub fn render_reference_list(chunks: &[ReferenceChunk], doc_base: &str) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut html = String::from(
        "<div class='mt-2 text-xs text-gray-500 border-t border-gray-200 pt-2'>\
         <p class='font-medium mb-1'>References:</p><ul class='list-disc list-inside'>",
    );

    for chunk in chunks {
        if chunk.document_id.is_empty() || !seen.insert(chunk.document_id.as_str()) {
            continue;
        }
        let href = format!("{doc_base}/document/{}", escape_html(&chunk.document_id));
        html.push_str(&format!(
            "<li><a href='{href}' target='_blank' class='text-primary hover:underline'>{}</a></li>",
            escape_html(&chunk.document_name)
        ));
    }

    html.push_str("</ul></div>");
    html
}

/// Minimal HTML escaping for text interpolated into the fragment.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
