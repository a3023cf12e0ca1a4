//! Record count coercion.

/// Largest float that still represents every integer below it exactly.
const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

/// Parses a raw record count.
///
/// Accepts non-negative integers and integral floats such as `"10.0"`
/// (spreadsheet exports write counts that way). Returns `None` for
/// non-numeric, negative, fractional or non-finite values.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_record_count(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u64>() {
        return Some(value);
    }

    let value = trimmed.parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > MAX_EXACT_F64 {
        return None;
    }
    Some(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integers_and_integral_floats() {
        assert_eq!(parse_record_count("10"), Some(10));
        assert_eq!(parse_record_count(" 0 "), Some(0));
        assert_eq!(parse_record_count("12.0"), Some(12));
    }

    #[test]
    fn rejects_invalid_counts() {
        assert_eq!(parse_record_count("-3"), None);
        assert_eq!(parse_record_count("-0.5"), None);
        assert_eq!(parse_record_count("2.5"), None);
        assert_eq!(parse_record_count("ten"), None);
        assert_eq!(parse_record_count("NaN"), None);
        assert_eq!(parse_record_count("inf"), None);
    }
}
