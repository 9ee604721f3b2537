/// All processor amounts are in USD minor units (cents).
pub const CURRENCY: &str = "usd";

// Keeps `amount * 100` well inside the range f64 represents exactly.
const MAX_MAJOR_AMOUNT: f64 = 1_000_000_000.0;

/// Converts a major-unit amount (dollars) into minor units (cents), rounding half away
/// from zero. Returns `None` for non-finite, zero, negative or absurdly large input.
pub fn to_minor_units(amount_major: f64) -> Option<i64> {
    if !amount_major.is_finite() || amount_major <= 0.0 || amount_major > MAX_MAJOR_AMOUNT {
        return None;
    }

    let minor = (amount_major * 100.0).round() as i64;
    (minor > 0).then_some(minor)
}

pub fn format_minor_units(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_whole_and_fractional_dollars() {
        assert_eq!(to_minor_units(150.0), Some(15_000));
        assert_eq!(to_minor_units(50.0), Some(5_000));
        assert_eq!(to_minor_units(19.99), Some(1_999));
        assert_eq!(to_minor_units(0.25), Some(25));
    }

    #[test]
    fn rejects_non_positive_and_non_finite_amounts() {
        for amount in [0.0, -5.0, 0.001, f64::NAN, f64::INFINITY, 2_000_000_000.0] {
            assert_eq!(to_minor_units(amount), None, "amount {amount} should be rejected");
        }
    }

    #[test]
    fn formats_cents_as_dollars() {
        assert_eq!(format_minor_units(15_000), "$150.00");
        assert_eq!(format_minor_units(5), "$0.05");
        assert_eq!(format_minor_units(-1_250), "-$12.50");
    }
}
