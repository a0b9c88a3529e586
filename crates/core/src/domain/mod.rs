pub mod catalog;
pub mod intake;
pub mod proposal;
pub mod risk;

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

/// Reads a decimal out of loosely typed JSON: numbers, numeric strings
/// (with `$`, spaces, `,`/`_` separators) and dotted thousands (`8.000.000`,
/// `85.000`). JSON numbers are never reinterpreted as dotted thousands.
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => parse_plain_decimal(&number.to_string()),
        Value::String(raw) => parse_decimal(raw),
        _ => None,
    }
}

/// Percentages never carry thousands separators: `12.500` and `"20 %"` read
/// as plain decimals.
pub fn percentage_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => parse_plain_decimal(&number.to_string()),
        Value::String(raw) => {
            let cleaned = raw.trim().trim_end_matches('%').trim();
            parse_plain_decimal(cleaned)
        }
        _ => None,
    }
}

fn parse_plain_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw)).ok()
}

pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned = raw
        .trim()
        .chars()
        .filter(|character| !matches!(character, '$' | ',' | '_' | ' '))
        .collect::<String>();
    if cleaned.is_empty() {
        return None;
    }

    if is_dotted_thousands(&cleaned) {
        return Decimal::from_str(&cleaned.replace('.', "")).ok();
    }
    parse_plain_decimal(&cleaned)
}

/// `800.000`, `$85.000`, `8.000.000`: every group after a dot has exactly
/// three digits and the leading group is a non-zero integer of 1 to 3 digits.
/// `0.500` and `12.5` stay decimals.
fn is_dotted_thousands(cleaned: &str) -> bool {
    let unsigned = cleaned.strip_prefix('-').unwrap_or(cleaned);
    let mut groups = unsigned.split('.');
    let Some(leading) = groups.next() else {
        return false;
    };
    let rest = groups.collect::<Vec<_>>();
    if rest.is_empty() {
        return false;
    }
    let digits = |group: &str| group.chars().all(|character| character.is_ascii_digit());
    (1..=3).contains(&leading.len())
        && digits(leading)
        && !leading.starts_with('0')
        && rest.iter().all(|group| group.len() == 3 && digits(group))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{decimal_from_json, percentage_from_json};

    #[test]
    fn reads_numbers_and_formatted_strings() {
        assert_eq!(decimal_from_json(&json!(8000000)), Some(Decimal::new(8_000_000, 0)));
        assert_eq!(decimal_from_json(&json!(12.5)), Some(Decimal::new(125, 1)));
        assert_eq!(decimal_from_json(&json!("$85,000")), Some(Decimal::new(85_000, 0)));
        assert_eq!(decimal_from_json(&json!("8.000.000")), Some(Decimal::new(8_000_000, 0)));
        assert_eq!(decimal_from_json(&json!("12.5")), Some(Decimal::new(125, 1)));
        assert_eq!(decimal_from_json(&json!("1e3")), Some(Decimal::new(1_000, 0)));
        assert_eq!(decimal_from_json(&json!("")), None);
        assert_eq!(decimal_from_json(&json!(null)), None);
        assert_eq!(decimal_from_json(&json!("n/a")), None);
    }

    #[test]
    fn single_dotted_group_is_a_thousands_separator() {
        assert_eq!(decimal_from_json(&json!("800.000")), Some(Decimal::new(800_000, 0)));
        assert_eq!(decimal_from_json(&json!("$85.000")), Some(Decimal::new(85_000, 0)));
        assert_eq!(decimal_from_json(&json!("$ 120.000")), Some(Decimal::new(120_000, 0)));
        assert_eq!(decimal_from_json(&json!("0.500")), Some(Decimal::new(5, 1)));
        assert_eq!(decimal_from_json(&json!("1234.500")), Some(Decimal::new(12_345, 1)));
        assert_eq!(decimal_from_json(&json!(1.125)), Some(Decimal::new(1_125, 3)));
    }

    #[test]
    fn percentages_are_read_as_plain_decimals() {
        assert_eq!(percentage_from_json(&json!("12.500")), Some(Decimal::new(12_500, 3)));
        assert_eq!(percentage_from_json(&json!("20 %")), Some(Decimal::new(20, 0)));
        assert_eq!(percentage_from_json(&json!(20)), Some(Decimal::new(20, 0)));
        assert_eq!(percentage_from_json(&json!("veinte")), None);
    }
}
