//! Numeric coercion helpers shared by the cleaning, enrichment and reporting code.

/// Parses money text, returning `None` for empty, malformed or non-finite values.
pub fn parse_money(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a sale quantity. Accepts integer text or a float with zero fraction
/// (CSV exports often write `2.0`).
pub fn parse_quantity(value: &str) -> Result<u32, String> {
    let trimmed = value.trim();
    if let Ok(q) = trimmed.parse::<i64>() {
        return u32::try_from(q).map_err(|_| format!("quantity {} out of range", q));
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => {
            Ok(f as u32)
        }
        Ok(f) if f < 0.0 => Err(format!("quantity {} out of range", f)),
        Ok(_) => Err("quantity must be a whole number".to_string()),
        Err(_) => Err("not a number".to_string()),
    }
}

/// Rounds half away from zero to two decimal places.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("10.50"), Some(10.5));
        assert_eq!(parse_money("  7 "), Some(7.0));
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("abc"), None);
        assert_eq!(parse_money("NaN"), None);
        assert_eq!(parse_money("inf"), None);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("3"), Ok(3));
        assert_eq!(parse_quantity("2.0"), Ok(2));
        assert!(parse_quantity("-1").is_err());
        assert!(parse_quantity("1.5").is_err());
        assert!(parse_quantity("two").is_err());
    }

    #[test]
    fn test_round_cents_and_mean() {
        assert_eq!(round_cents(13.004), 13.0);
        assert_eq!(round_cents(26.666), 26.67);
        assert_eq!(round_cents(-3.333), -3.33);
        assert_eq!(mean(vec![10.0, 20.0]), Some(15.0));
        assert_eq!(mean(Vec::<f64>::new()), None);
    }
}
