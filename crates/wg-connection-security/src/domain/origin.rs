//! Origin allow-list matching.
//!
//! Entries are exact origins (`https://app.example.com`) or globs where `*`
//! matches any run of characters (`https://*.example.com`). Comparison is
//! case-insensitive and ignores a trailing slash.

use regex::Regex;

fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Whether `origin` matches a single allow-list entry.
pub fn origin_matches(pattern: &str, origin: &str) -> bool {
    let pattern = normalize(pattern);
    let origin = normalize(origin);
    if pattern.is_empty() || origin.is_empty() {
        return false;
    }
    if !pattern.contains('*') {
        return pattern == origin;
    }

    let expression = format!("^{}$", regex::escape(&pattern).replace(r"\*", ".*"));
    match Regex::new(&expression) {
        Ok(glob) => glob.is_match(&origin),
        Err(_) => false,
    }
}

/// Whether `origin` matches any entry of `allow_list`.
pub fn is_origin_allowed(allow_list: &[String], origin: &str) -> bool {
    allow_list.iter().any(|pattern| origin_matches(pattern, origin))
}
