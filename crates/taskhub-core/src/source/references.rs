use std::sync::LazyLock;

use regex::Regex;

/// Tracker keys: an uppercase project prefix of at least two characters,
/// a dash and a number.
static TICKET_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Z0-9]+-[0-9]+\b").ok());

/// Finds tracker keys such as `PROJ-123` in free text, deduplicated in
/// first-seen order. Adapters use it to build `Task::cross_refs` from
/// descriptions and titles.
pub fn ticket_references(text: &str) -> Vec<String> {
    let Some(pattern) = TICKET_KEY.as_ref() else {
        return Vec::new();
    };

    // Branch names join keys with underscores, which `\b` treats as word
    // characters.
    let text = text.replace('_', " ");
    let mut found: Vec<String> = Vec::new();
    for key in pattern.find_iter(&text).map(|found| found.as_str()) {
        if !found.iter().any(|existing| existing == key) {
            found.push(key.to_string());
        }
    }
    found
}
