// Settings document parser - reads PalWorldSettings.ini-style text into
// sections of key/value pairs, tolerant of everything the server itself
// tolerates.

use std::collections::HashMap;

use crate::settings::{FormatError, SectionValues};

/// Bucket used for assignments that appear before any `[Header]` line.
pub const DEFAULT_SECTION: &str = "PalWorldSettings";

const AGGREGATE_KEY: &str = "OptionSettings=";

/// Parsed view of a settings file. Values are stored unquoted; the original
/// text is not retained, so writing changes back goes through
/// [`apply`](crate::settings::apply) against the raw text instead.
#[derive(Debug, Clone, Default)]
pub struct SettingsDocument {
    sections: HashMap<String, SectionValues>,
    order: Vec<String>,
}

impl SettingsDocument {
    /// Values of one named section, if the document has it.
    pub fn section(&self, name: &str) -> Option<&SectionValues> {
        self.sections.get(name)
    }

    /// All sections in the order their headers appeared.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &SectionValues)> {
        self.order.iter().map(|name| (name.as_str(), &self.sections[name]))
    }

    /// Merged view over every section, later sections winning on duplicate
    /// keys. Real server files carry a single meaningful section, so this is
    /// the view most callers want.
    pub fn settings(&self) -> SectionValues {
        let mut merged = SectionValues::new();
        for name in &self.order {
            for (key, value) in &self.sections[name] {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn entry(&mut self, name: &str) -> &mut SectionValues {
        if !self.sections.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.sections.entry(name.to_string()).or_default()
    }
}

/// Parses raw settings text. Blank lines and `;`/`#` comments are skipped,
/// `[Header]` lines open sections, and the aggregate `OptionSettings=(...)`
/// line is exploded into individual fields. Input with no section header and
/// no assignment at all is rejected; a malformed aggregate line degrades to a
/// plain assignment rather than failing the whole file.
pub fn parse(text: &str) -> Result<SettingsDocument, FormatError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut doc = SettingsDocument::default();
    let mut current: Option<String> = None;
    let mut saw_header = false;
    let mut saw_assignment = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if line.len() >= 2 && line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].to_string();
            doc.entry(&name);
            current = Some(name);
            saw_header = true;
            continue;
        }

        let section = current.clone().unwrap_or_else(|| DEFAULT_SECTION.to_string());

        if let Some(inner) = aggregate_inner(line) {
            let values = doc.entry(&section);
            for (start, end) in pair_spans(inner) {
                if let Some((key, value)) = split_assignment(&inner[start..end]) {
                    values.insert(key.to_string(), unquote(value).to_string());
                    saw_assignment = true;
                }
            }
            current = Some(section);
            continue;
        }

        if let Some((key, value)) = split_assignment(line) {
            doc.entry(&section).insert(key.to_string(), unquote(value).to_string());
            current = Some(section);
            saw_assignment = true;
        }
    }

    if !saw_header && !saw_assignment {
        return Err(FormatError::NoAssignableContent);
    }
    Ok(doc)
}

/// Text between the parentheses of an `OptionSettings=(...)` line, located by
/// balance rather than by first-closing-paren so nested lists such as
/// `CrossplayPlatforms=(Steam,Xbox)` do not truncate the block.
fn aggregate_inner(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(AGGREGATE_KEY)?;
    if !rest.starts_with('(') {
        return None;
    }
    let close = matching_paren(rest)?;
    Some(&rest[1..close])
}

/// Byte index of the `)` that closes the `(` at byte 0. Quotes suspend paren
/// counting so a parenthesis inside a quoted value cannot unbalance the scan.
pub(crate) fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte ranges of the comma-separated tokens inside an aggregate block.
/// Commas nested in quotes or parentheses do not split; empty tokens are
/// dropped. The writer walks these same spans, so parser and writer can never
/// disagree about where a field starts and ends.
pub(crate) fn pair_spans(inner: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut depth = 0i32;
    let mut in_quotes = false;

    for (i, c) in inner.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth -= 1,
            ',' if !in_quotes && depth == 0 => {
                if i > start {
                    spans.push((start, i));
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if inner.len() > start {
        spans.push((start, inner.len()));
    }
    spans
}

/// Splits `Key=Value` at the first `=`. Tokens without one, or with an empty
/// key, are not assignments.
pub(crate) fn split_assignment(token: &str) -> Option<(&str, &str)> {
    let eq = token.find('=')?;
    let key = token[..eq].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, token[eq + 1..].trim()))
}

/// Strips one layer of surrounding double quotes, if present.
pub(crate) fn unquote(value: &str) -> &str {
    let v = value.trim();
    if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
        &v[1..v.len() - 1]
    } else {
        v
    }
}
