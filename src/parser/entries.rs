use std::sync::LazyLock;

use regex::Regex;

// "LAST, First (a.k.a. ...); DOB ..." -> "LAST, First"
static NAME_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^(;]+?)(?:\s*\(|;|$)").unwrap());

/// Collapse runs of whitespace (including non-breaking spaces) to one space.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn name_parts(entry: &str) -> Option<Vec<&str>> {
    let prefix = NAME_PREFIX_RE.captures(entry.trim())?.get(1)?.as_str();
    let prefix = prefix.trim().trim_end_matches(',').trim();
    if prefix.is_empty() {
        return None;
    }
    Some(prefix.split(',').map(str::trim).collect())
}

/// `"SURNAME, Given"` from an individual's entry.
pub fn individual_name(entry: &str) -> Option<String> {
    match name_parts(entry)?.as_slice() {
        [last, first, ..] if !last.is_empty() && !first.is_empty() => {
            Some(format!("{}, {}", last, first))
        }
        _ => None,
    }
}

/// Leading name segment of an entity's entry.
pub fn entity_name(entry: &str) -> Option<String> {
    name_parts(entry)?
        .first()
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
}

// ── Tests ──
