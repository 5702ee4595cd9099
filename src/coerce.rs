// src/coerce.rs

/// Thousands separators seen in the enrollment pages (ASCII and full-width).
const SEPARATORS: &[char] = &[',', '，'];

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Turn a textual head-count such as `"1,234人"` into `1234`.
///
/// Every trailing `unit` character is removed, then every thousands
/// separator. Anything that does not parse as a non-negative integer
/// afterwards (empty cells, dashes, notes) yields `None`.
pub fn coerce_count(raw: &str, unit: &str) -> Option<u64> {
    let mut s = clean_str(raw);
    if !unit.is_empty() {
        while let Some(rest) = s.strip_suffix(unit) {
            s = rest;
        }
    }
    let digits: String = s.trim().chars().filter(|c| !SEPARATORS.contains(c)).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Parse a coordinate. Non-finite values count as failures.
pub fn coerce_float(raw: &str) -> Option<f64> {
    clean_str(raw)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_unit_and_separators() {
        assert_eq!(coerce_count("1,234人", "人"), Some(1234));
        assert_eq!(coerce_count("60人", "人"), Some(60));
        assert_eq!(coerce_count(" 1，002人 ", "人"), Some(1002));
        assert_eq!(coerce_count("7", "人"), Some(7));
        assert_eq!(coerce_count("0人", "人"), Some(0));
    }

    #[test]
    fn repeated_unit_is_stripped() {
        assert_eq!(coerce_count("12人人", "人"), Some(12));
    }

    #[test]
    fn garbage_becomes_missing() {
        for raw in ["", "人", "-", "―", "n/a", "12名", "1.5人", "-3人", "  "] {
            assert_eq!(coerce_count(raw, "人"), None, "{raw:?}");
        }
    }

    #[test]
    fn missing_is_distinct_from_zero() {
        assert_ne!(coerce_count("", "人"), coerce_count("0人", "人"));
    }

    #[test]
    fn floats() {
        assert_eq!(coerce_float("34.01"), Some(34.01));
        assert_eq!(coerce_float(" 132.99 "), Some(132.99));
        assert_eq!(coerce_float("\"133.0\""), Some(133.0));
        assert_eq!(coerce_float(""), None);
        assert_eq!(coerce_float("north"), None);
        assert_eq!(coerce_float("NaN"), None);
        assert_eq!(coerce_float("inf"), None);
    }

    #[test]
    fn clean_str_unquotes() {
        assert_eq!(clean_str("  \"abc\" "), "abc");
        assert_eq!(clean_str("\""), "\"");
        assert_eq!(clean_str("x"), "x");
    }
}
