//! Key recognition over arbitrary text.
//!
//! A key is three to five groups of four or five ASCII alphanumerics, with an
//! optional hyphen between groups. To keep prose and long numeric ids out of
//! the inventory, a match is discarded when the twelve characters starting at
//! it are all non-digits or all non-letters; scanning then resumes one
//! character further on, so a shorter key embedded in the same run can still
//! be found.

use std::sync::LazyLock;

use regex::Regex;

const GROUP: &str = "[A-Za-z0-9]{4,5}";
const UNIFORM_RUN: usize = 12;

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&key_pattern()).expect("key pattern is a valid regex")
});

static FULL_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^(?:{})$", key_pattern())).expect("key pattern is a valid regex")
});

fn key_pattern() -> String {
    format!("{GROUP}-?{GROUP}-?{GROUP}(?:-?{GROUP}(?:-?{GROUP})?)?")
}

/// How an ingestion input should be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestInput {
    /// A remote document to fetch and scan.
    Locator(String),
    /// One key, already validated.
    Literal(String),
    Invalid,
}

/// Every non-overlapping key match in order of appearance, duplicates kept.
pub fn extract_candidates(text: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut at = 0;
    while let Some(m) = KEY_PATTERN.find_at(text, at) {
        if starts_with_uniform_run(&text[m.start()..]) {
            // Matches always begin on an ASCII alphanumeric.
            at = m.start() + 1;
            continue;
        }
        candidates.push(m.as_str().to_string());
        at = m.end();
    }
    candidates
}

/// True when the whole (trimmed) input is exactly one key.
pub fn is_valid_key(input: &str) -> bool {
    let input = input.trim();
    FULL_KEY_PATTERN.is_match(input) && !starts_with_uniform_run(input)
}

/// True for `http://` or `https://` strings naming a host.
pub fn is_locator(input: &str) -> bool {
    let input = input.trim();
    if input.chars().any(char::is_whitespace) {
        return false;
    }
    ["https://", "http://"].iter().any(|scheme| {
        input
            .get(..scheme.len())
            .filter(|head| head.eq_ignore_ascii_case(scheme))
            .map(|_| {
                let rest = &input[scheme.len()..];
                let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
                !host.is_empty()
            })
            .unwrap_or(false)
    })
}

pub fn classify_ingest_input(input: &str) -> IngestInput {
    let trimmed = input.trim();
    if is_locator(trimmed) {
        IngestInput::Locator(trimmed.to_string())
    } else if is_valid_key(trimmed) {
        IngestInput::Literal(trimmed.to_string())
    } else {
        IngestInput::Invalid
    }
}

fn starts_with_uniform_run(text: &str) -> bool {
    let window: Vec<char> = text.chars().take(UNIFORM_RUN).collect();
    if window.len() < UNIFORM_RUN {
        return false;
    }
    window.iter().all(|c| !c.is_ascii_digit()) || window.iter().all(|c| !c.is_ascii_alphabetic())
}
