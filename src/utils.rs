use crate::error::{Result, VarianceError};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parses a ledger period cell into a calendar date.
///
/// Accepts ISO dates (`2024-01-31`), slash dates (`2024/01/31`, `01/31/2024`),
/// timestamps (`2024-01-31 00:00:00`, `2024-01-31T00:00:00`) and bare months
/// (`2024-01`, read as the first day of the month).
pub fn parse_ledger_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, format) {
            return Some(timestamp.date());
        }
    }

    NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").ok()
}

/// Division with a defined-zero policy.
///
/// Returns zero when the denominator is zero or the quotient overflows, so
/// percentages never surface as an error or a panic.
pub fn safe_divide(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }

    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// Overflow-checked addition of two amounts. `context` names the running sum
/// in the error.
pub fn checked_add(total: Decimal, amount: Decimal, context: &str) -> Result<Decimal> {
    total
        .checked_add(amount)
        .ok_or_else(|| VarianceError::AmountOverflow(context.to_string()))
}

/// Parses a numeric ledger cell exactly. Empty cells read as zero.
///
/// Plain decimals (`1234.56`, `-3`) and scientific notation (`1.5e3`) are
/// accepted.
pub fn parse_amount(value: &str) -> Option<Decimal> {
    let value = value.trim();
    if value.is_empty() {
        return Some(Decimal::ZERO);
    }

    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}
