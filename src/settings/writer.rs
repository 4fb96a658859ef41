// Round-trip settings writer - splices changed values into the raw file
// text so that every byte the caller did not touch survives verbatim.

use tracing::debug;

use crate::settings::document::{matching_paren, pair_spans, split_assignment, unquote};
use crate::settings::{ChangeSet, FormatError};

const BLOCK_PREFIX: &str = "OptionSettings=(";

/// Applies `changes` onto raw settings text, rewriting only the value tokens
/// that actually differ. Field order, quoting style, comments, headers and
/// whitespace all come through untouched, and fields absent from the file are
/// never inserted. Fails only when the text has no `OptionSettings=(...)`
/// block to edit.
pub fn apply(text: &str, changes: &ChangeSet) -> Result<String, FormatError> {
    let block_start = text.find(BLOCK_PREFIX).ok_or(FormatError::MissingOptionBlock)?;
    let paren = block_start + BLOCK_PREFIX.len() - 1;
    let close = matching_paren(&text[paren..]).ok_or(FormatError::MissingOptionBlock)?;

    let inner_start = paren + 1;
    let inner_end = paren + close;
    let inner = &text[inner_start..inner_end];

    let rebuilt = rewrite_pairs(inner, changes);
    if rebuilt == inner {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len() + 16);
    out.push_str(&text[..inner_start]);
    out.push_str(&rebuilt);
    out.push_str(&text[inner_end..]);
    Ok(out)
}

/// Walks the same token spans the parser produces and splices replacement
/// values in place. Bytes between and around tokens are copied through
/// untouched.
fn rewrite_pairs(inner: &str, changes: &ChangeSet) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut cursor = 0usize;
    let mut seen: Vec<&str> = Vec::new();

    for (start, end) in pair_spans(inner) {
        let token = &inner[start..end];
        let Some((key, raw_value)) = split_assignment(token) else {
            continue;
        };
        seen.push(key);

        let Some(new_value) = changes.get(key) else {
            continue;
        };
        if unquote(raw_value) == new_value {
            continue;
        }

        // Replace exactly the trimmed value bytes; whitespace around the
        // `=` and the separating commas stays where it was.
        let eq = token.find('=').unwrap_or(0);
        let value_off = start + eq + 1;
        let (lead, trimmed_len) = trimmed_range(&token[eq + 1..]);
        let replace_start = value_off + lead;
        let replace_end = replace_start + trimmed_len;

        out.push_str(&inner[cursor..replace_start]);
        out.push_str(&render_value(&inner[replace_start..replace_end], new_value));
        cursor = replace_end;
    }
    out.push_str(&inner[cursor..]);

    for key in changes.keys() {
        if !seen.contains(&key.as_str()) {
            debug!("field not present in OptionSettings block, skipped: {}", key);
        }
    }
    out
}

/// Offset and length of the value once surrounding whitespace is dropped.
fn trimmed_range(raw: &str) -> (usize, usize) {
    let trimmed = raw.trim_start();
    let lead = raw.len() - trimmed.len();
    (lead, trimmed.trim_end().len())
}

/// Renders the replacement token, keeping the file's quoting convention: a
/// value that was quoted stays quoted, an empty replacement becomes `""` so
/// the assignment keeps a visible right-hand side, everything else is written
/// bare.
fn render_value(original: &str, new_value: &str) -> String {
    let was_quoted =
        original.len() >= 2 && original.starts_with('"') && original.ends_with('"');
    if was_quoted || new_value.is_empty() {
        format!("\"{}\"", new_value)
    } else {
        new_value.to_string()
    }
}
