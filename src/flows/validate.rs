//! Field validators shared by the wizard handlers.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use rust_decimal::Decimal;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

static DOB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("dob regex"));

/// Trimmed length is at least `min` characters.
pub fn min_len(input: &str, min: usize) -> bool {
    input.trim().chars().count() >= min
}

pub fn valid_email(input: &str) -> bool {
    EMAIL_RE.is_match(input.trim())
}

/// Password policy: ≥6 chars, ≥1 uppercase, ≥1 of `! @ # $ & *`, ≥1 digit.
pub fn valid_password(input: &str) -> bool {
    input.chars().count() >= 6
        && input.chars().any(|c| c.is_ascii_uppercase())
        && input.chars().any(|c| "!@#$&*".contains(c))
        && input.chars().any(|c| c.is_ascii_digit())
}

/// Strict `MM/DD/YYYY` calendar validation.
///
/// Month, day, and year must be in range AND the triple must name a real
/// calendar date — `02/30/1990` is rejected even though every component is
/// individually in range.
pub fn valid_dob(input: &str) -> bool {
    let Some(caps) = DOB_RE.captures(input.trim()) else {
        return false;
    };
    let month: u32 = caps[1].parse().unwrap_or(0);
    let day: u32 = caps[2].parse().unwrap_or(0);
    let year: i32 = caps[3].parse().unwrap_or(0);

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return false;
    }
    if year < 1900 || year > Utc::now().year() {
        return false;
    }
    // Round-trip through date construction: rejects e.g. Feb 30.
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date.month() == month && date.day() == day && date.year() == year,
        None => false,
    }
}

/// Parse a user-entered amount: `$` prefix and thousands separators are
/// tolerated. Returns `None` for anything non-numeric or negative.
pub fn parse_amount(input: &str) -> Option<Decimal> {
    let cleaned: String = input
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let amount: Decimal = cleaned.parse().ok()?;
    if amount.is_sign_negative() {
        return None;
    }
    Some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn min_len_trims() {
        assert!(min_len("  ab  ", 2));
        assert!(!min_len("  a  ", 2));
    }

    #[test]
    fn email_shapes() {
        assert!(valid_email("user@example.com"));
        assert!(valid_email("  first.last@mail.co.uk "));
        assert!(!valid_email("user@nodot"));
        assert!(!valid_email("no at sign.com"));
    }

    #[test]
    fn password_policy() {
        // No uppercase, no special char.
        assert!(!valid_password("abc123"));
        assert!(valid_password("Abc123!"));
        // Missing digit.
        assert!(!valid_password("Abcdef!"));
        // Missing special.
        assert!(!valid_password("Abc1234"));
        // Too short.
        assert!(!valid_password("Ab1!"));
    }

    #[test]
    fn dob_calendar_validation() {
        assert!(valid_dob("01/31/1990"));
        // Invalid calendar date.
        assert!(!valid_dob("02/30/1990"));
        // Month out of range.
        assert!(!valid_dob("13/01/1990"));
        // Day out of range.
        assert!(!valid_dob("01/32/1990"));
        // Year bounds.
        assert!(!valid_dob("01/01/1899"));
        assert!(!valid_dob("01/01/2999"));
        // Shape.
        assert!(!valid_dob("1/31/1990"));
        assert!(!valid_dob("1990-01-31"));
    }

    #[test]
    fn amount_parsing() {
        assert_eq!(parse_amount("25"), Some(dec!(25)));
        assert_eq!(parse_amount("$10.50"), Some(dec!(10.50)));
        assert_eq!(parse_amount("1,250"), Some(dec!(1250)));
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("ten"), None);
    }
}
