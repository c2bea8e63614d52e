//! Utility functions and helpers.

pub mod http;

/// Last `/`-separated segment of an href, as the portal uses it for ids.
///
/// Query strings and fragments are kept; the portal never appends them to
/// person links.
pub fn last_path_segment(href: &str) -> String {
    href.rsplit('/').next().unwrap_or("").to_string()
}

/// Integer prefix of `text` after leading whitespace, stopping at the first non-digit.
pub fn leading_int(text: &str) -> Option<u32> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// First run of ASCII digits anywhere in `text`, or 0.
pub fn first_number(text: &str) -> u32 {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
