//! Canonical forms for line codes and free-text descriptions.
//!
//! Upstream feeds are loose about line codes ("14", " 43x ", "Linje 27 S") and
//! descriptions carry Swedish diacritics inconsistently ("Närtrafiken",
//! "Nartrafiken"). Everything downstream matches against the normalized form
//! produced here.
//!
//! Both functions are total: they never fail, and empty input yields an empty
//! string.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Pattern for the line token: digits optionally followed by letters.
///
/// Case-insensitive so that "43x" and "43X" resolve to the same code.
fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(\d+\s*[A-Z]+|\d+)").unwrap())
}

/// Normalize a raw line designation to its canonical code.
///
/// Extracts the first numeric-plus-optional-letter token, falling back to the
/// trimmed input when no digits are present, then strips whitespace and
/// uppercases.
///
/// # Examples
///
/// ```
/// use livetransit::normalize::normalize_line;
///
/// assert_eq!(normalize_line(" 14 "), "14");
/// assert_eq!(normalize_line("43 x"), "43X");
/// assert_eq!(normalize_line("Linje 27S"), "27S");
/// assert_eq!(normalize_line("ropsten"), "ROPSTEN");
/// assert_eq!(normalize_line(""), "");
/// ```
pub fn normalize_line(raw: &str) -> String {
    let trimmed = raw.trim();
    let token = line_pattern()
        .find(trimmed)
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    token
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Normalize a free-text description for accent-insensitive matching.
///
/// Trims, lowercases and removes combining marks after canonical
/// decomposition, so "Ersättningsbuss" becomes "ersattningsbuss".
pub fn normalize_description(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}
