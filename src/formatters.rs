// src/formatters.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds half away from zero, then renders exactly `dp` decimals.
fn fixed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", dp as usize, rounded)
}

/// Inserts `,` every three digits of an unsigned integer string.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// en-US dollar amount with exactly two decimals: `$1,234.56`, `-$12.30`.
pub fn format_currency(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let digits = fixed(rounded.abs(), 2);
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));
    format!("{}${}.{}", sign, group_thousands(int_part), frac_part)
}

/// `+1.50%` / `-0.25%`. The sign is decided on the unrounded value.
pub fn format_percentage(value: Decimal, decimals: u32) -> String {
    let sign = if value >= Decimal::ZERO { "+" } else { "" };
    format!("{}{}%", sign, fixed(value, decimals))
}

/// Funding rates arrive as fractions; shown as a signed percentage with 4 decimals.
pub fn format_funding_rate(rate: Decimal) -> String {
    format_percentage(rate * Decimal::ONE_HUNDRED, 4)
}

/// Tiered precision so both large caps and micro-priced instruments stay readable.
pub fn format_price(price: Decimal) -> String {
    let dp = if price >= Decimal::ONE_THOUSAND {
        2
    } else if price >= Decimal::ONE {
        4
    } else if price >= Decimal::new(1, 2) {
        6
    } else {
        8
    };
    fixed(price, dp)
}

/// Integer count with thousands separators, e.g. `1,250,000`.
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Accepts RFC 3339, naive ISO-8601 (treated as UTC) or a bare date.
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    let ts = timestamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, pattern) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(ts, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// "Just now", "Nm ago", "Nh ago" or "Nd ago", all floored.
pub fn format_relative_time_at(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_ms = (now - then).num_milliseconds();
    let diff_mins = diff_ms.div_euclid(60_000);
    let diff_hours = diff_ms.div_euclid(3_600_000);
    let diff_days = diff_ms.div_euclid(86_400_000);

    if diff_mins < 1 {
        "Just now".to_string()
    } else if diff_mins < 60 {
        format!("{}m ago", diff_mins)
    } else if diff_hours < 24 {
        format!("{}h ago", diff_hours)
    } else {
        format!("{}d ago", diff_days)
    }
}

pub fn format_relative_time(timestamp: &str) -> String {
    match parse_timestamp(timestamp) {
        Some(then) => format_relative_time_at(then, Utc::now()),
        None => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::dec;

    #[test]
    fn test_format_price_tiers() {
        assert_eq!(format_price(dec!(1500)), "1500.00");
        assert_eq!(format_price(dec!(1000)), "1000.00");
        assert_eq!(format_price(dec!(5)), "5.0000");
        assert_eq!(format_price(dec!(1)), "1.0000");
        assert_eq!(format_price(dec!(0.05)), "0.050000");
        assert_eq!(format_price(dec!(0.01)), "0.010000");
        assert_eq!(format_price(dec!(0.0001)), "0.00010000");
        assert_eq!(format_price(dec!(999.99999)), "1000.0000");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(dec!(0)), "$0.00");
        assert_eq!(format_currency(dec!(12.3)), "$12.30");
        assert_eq!(format_currency(dec!(1234.565)), "$1,234.57");
        assert_eq!(format_currency(dec!(1234567.891)), "$1,234,567.89");
        assert_eq!(format_currency(dec!(-987654.3)), "-$987,654.30");
        assert_eq!(format_currency(dec!(100)), "$100.00");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(dec!(2.5), 2), "+2.50%");
        assert_eq!(format_percentage(dec!(0), 2), "+0.00%");
        assert_eq!(format_percentage(dec!(-1.234), 1), "-1.2%");
        assert_eq!(format_percentage(dec!(57.5), 0), "+58%");
    }

    #[test]
    fn test_format_funding_rate() {
        assert_eq!(format_funding_rate(dec!(0.0001)), "+0.0100%");
        assert_eq!(format_funding_rate(dec!(-0.00025)), "-0.0250%");
    }

    #[test]
    fn test_relative_time_boundaries() {
        let now = Utc::now();
        assert_eq!(format_relative_time_at(now - Duration::seconds(45), now), "Just now");
        assert_eq!(format_relative_time_at(now - Duration::seconds(90), now), "1m ago");
        assert_eq!(format_relative_time_at(now - Duration::minutes(59), now), "59m ago");
        assert_eq!(format_relative_time_at(now - Duration::minutes(60), now), "1h ago");
        assert_eq!(format_relative_time_at(now - Duration::minutes(23 * 60 + 59), now), "23h ago");
        assert_eq!(format_relative_time_at(now - Duration::hours(25), now), "1d ago");
        assert_eq!(format_relative_time_at(now - Duration::hours(71), now), "2d ago");
        assert_eq!(format_relative_time_at(now + Duration::minutes(5), now), "Just now");
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
            .and_utc();
        assert_eq!(parse_timestamp("2025-01-15T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-15T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-15T12:30:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-15 12:30:00"), Some(expected));
        assert!(parse_timestamp("2025-01-15").is_some());
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(format_relative_time("not a date"), "Unknown");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_250_000), "1,250,000");
    }
}
