//! Parsing of numbers read off the screen.

use std::sync::OnceLock;

use regex::Regex;

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+").unwrap())
}

/// All ASCII digits in `text` read as one number; `None` when there are none.
pub fn positive_digits(text: &str) -> Option<u32> {
    let joined: String = digits_re()
        .find_iter(text)
        .map(|m| m.as_str())
        .collect();
    if joined.is_empty() {
        return None;
    }
    joined.parse().ok()
}

/// Parse a "current/max" counter such as `"120/300"`.
///
/// Tolerates a trailing `+`, and a `/` misread as `1` when the known
/// maximum is present (`"1201300"` reads as 120).
pub fn parse_counter(text: &str, max_suffix: &str) -> Option<u32> {
    let mut s = text.trim();
    s = s.strip_suffix('+').unwrap_or(s);
    let mut found_max = false;
    if let Some(rest) = s.strip_suffix(max_suffix) {
        found_max = true;
        s = rest;
    }
    let mut found_slash = false;
    if let Some(rest) = s.strip_suffix('/') {
        found_slash = true;
        s = rest;
    }
    if found_max && !found_slash {
        s = s.strip_suffix('1').unwrap_or(s);
    }
    positive_digits(s)
}

/// Trailblaze Power, out of 300.
pub fn parse_power(text: &str) -> Option<u32> {
    parse_counter(text, "300")
}

/// Immersifiers, out of 12.
pub fn parse_immersifiers(text: &str) -> Option<u32> {
    parse_counter(text, "12")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_digits() {
        assert_eq!(positive_digits("x6"), Some(6));
        assert_eq!(positive_digits("1 2 0"), Some(120));
        assert_eq!(positive_digits("none"), None);
    }

    #[test]
    fn test_power_variants() {
        assert_eq!(parse_power("120/300"), Some(120));
        assert_eq!(parse_power("120/300+"), Some(120));
        assert_eq!(parse_power("1201300"), Some(120));
        assert_eq!(parse_power("300/300"), Some(300));
        assert_eq!(parse_power("85"), Some(85));
        assert_eq!(parse_power("/300"), None);
        assert_eq!(parse_power(""), None);
    }

    #[test]
    fn test_immersifier_variants() {
        assert_eq!(parse_immersifiers("5/12"), Some(5));
        assert_eq!(parse_immersifiers("5112"), Some(5));
        assert_eq!(parse_immersifiers("12/12"), Some(12));
        assert_eq!(parse_immersifiers("0/12"), Some(0));
    }
}
