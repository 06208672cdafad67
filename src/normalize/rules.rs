//! Normalization rules
//!
//! One pure function per semantic type. Nothing here logs, allocates
//! shared state or inspects anything but its own input.

use super::types::{FieldType, FieldValue, NormalizeError};
use crate::types::{CasePolicy, JsonValue};
use chrono::{Datelike, NaiveDate, NaiveTime};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

type NormalizeResult = std::result::Result<FieldValue, NormalizeError>;

static PERSON_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}+(?:[-\s'\p{L}]+)*\.?$").unwrap());

static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static COUNTRY_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\d+\(").unwrap());

static WEIGHT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)\s*x\s*)?(\d+(?:\.\d+)?)\s*(kg|g|ml|oz|l)?$").unwrap()
});

/// Street abbreviations expanded in addresses
static STREET_ABBREVIATIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"(?i)\bst\.").unwrap(), "Street"),
        (Regex::new(r"(?i)\bave\b\.?").unwrap(), "Avenue"),
        (Regex::new(r"(?i)\brd\.").unwrap(), "Road"),
    ]
});

/// Tokens treated as an absent value
const NULL_TOKENS: [&str; 3] = ["", "null", "n/a"];

/// Currency symbols stripped from money values
const CURRENCY_SYMBOLS: [char; 3] = ['£', '$', '€'];

const OUNCE_IN_KG: Decimal = Decimal::from_parts(283_495, 0, 0, false, 7);

/// Integer digits admitted by the `DECIMAL(12,2)` money column
const MONEY_INTEGER_DIGITS: u32 = 10;

/// Integer digits admitted by the `DECIMAL(12,3)` weight column
const WEIGHT_INTEGER_DIGITS: u32 = 9;

/// Whether a raw value is one of the null tokens
pub fn is_null_token(raw: &JsonValue) -> bool {
    match raw {
        JsonValue::Null => true,
        JsonValue::String(s) => {
            let trimmed = s.trim();
            NULL_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
        }
        _ => false,
    }
}

/// Normalize a raw value to the given semantic type
pub fn normalize(raw: &JsonValue, ty: &FieldType) -> NormalizeResult {
    if is_null_token(raw) {
        return Ok(FieldValue::Null);
    }

    match ty {
        FieldType::Text { case } => normalize_text(raw, *case),
        FieldType::PersonName => normalize_person_name(raw),
        FieldType::Email => normalize_email(raw),
        FieldType::Address => normalize_address(raw),
        FieldType::Phone => normalize_phone(raw),
        FieldType::Money => normalize_money(raw),
        FieldType::Decimal => normalize_decimal(raw).map(FieldValue::Decimal),
        FieldType::Integer => normalize_integer(raw),
        FieldType::Date { formats } => normalize_date(raw, formats),
        FieldType::Time => normalize_time(raw),
        FieldType::ExpiryDate => normalize_expiry(raw),
        FieldType::Code {
            case,
            allowed,
            aliases,
        } => normalize_code(raw, *case, allowed, aliases),
        FieldType::Uuid => normalize_uuid(raw),
        FieldType::Boolean { truthy, falsy } => normalize_boolean(raw, truthy, falsy),
        FieldType::Weight => normalize_weight(raw),
        FieldType::CardNumber => normalize_card_number(raw),
        FieldType::Reference { key, .. } => match key {
            Some(key) => normalize(raw, key),
            None => normalize_text(raw, CasePolicy::Preserve),
        },
    }
}

// ============================================================================
// Scalars
// ============================================================================

/// Render a scalar as text; objects and arrays are never valid field values
fn scalar_text(raw: &JsonValue, expected: &'static str) -> Result<String, NormalizeError> {
    match raw {
        JsonValue::String(s) => Ok(s.trim().to_string()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        other => Err(NormalizeError::mismatch(expected, other.to_string())),
    }
}

/// Only strings are accepted for textual types that have a format
fn string_only(raw: &JsonValue, expected: &'static str) -> Result<String, NormalizeError> {
    match raw {
        JsonValue::String(s) => Ok(s.trim().to_string()),
        other => Err(NormalizeError::mismatch(expected, other.to_string())),
    }
}

fn normalize_text(raw: &JsonValue, case: CasePolicy) -> NormalizeResult {
    let text = scalar_text(raw, "text")?;
    Ok(FieldValue::Text(case.apply(&text)))
}

fn normalize_person_name(raw: &JsonValue) -> NormalizeResult {
    let name = string_only(raw, "person name")?;
    if PERSON_NAME_REGEX.is_match(&name) {
        Ok(FieldValue::Text(name))
    } else {
        Err(NormalizeError::mismatch("person name", name))
    }
}

fn normalize_email(raw: &JsonValue) -> NormalizeResult {
    let email = string_only(raw, "email address")?.replace("@@", "@");

    let parts: Vec<&str> = email.split(['@', '.']).collect();
    let well_formed = email.matches('@').count() == 1
        && parts.len() > 2
        && parts.iter().all(|p| !p.is_empty() && !p.contains(char::is_whitespace));

    if well_formed {
        Ok(FieldValue::Text(email))
    } else {
        Err(NormalizeError::mismatch("email address", email))
    }
}

fn normalize_address(raw: &JsonValue) -> NormalizeResult {
    let address = string_only(raw, "address")?.replace('\n', ", ");
    let mut address = WHITESPACE_REGEX.replace_all(address.trim(), " ").into_owned();

    for (pattern, full) in STREET_ABBREVIATIONS.iter() {
        address = pattern.replace_all(&address, *full).into_owned();
    }

    Ok(FieldValue::Text(CasePolicy::Title.apply(&address)))
}

fn normalize_phone(raw: &JsonValue) -> NormalizeResult {
    let phone = scalar_text(raw, "phone number")?;

    // "+44(0)20 7946 0000" keeps only the national part
    let national = COUNTRY_PREFIX_REGEX.replace(&phone, "(");
    let national = national.strip_prefix("(0)").unwrap_or(&national);
    let cleaned: String = national.chars().filter(|c| !"().".contains(*c)).collect();
    let cleaned = WHITESPACE_REGEX.replace_all(cleaned.trim(), " ").into_owned();

    let digits = cleaned.chars().filter(char::is_ascii_digit).count();
    let allowed = cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-' || c == '+' || c == 'x');
    if digits < 6 || !allowed || cleaned[1..].contains('+') {
        return Err(NormalizeError::mismatch("phone number", phone));
    }

    if cleaned.starts_with('0') || cleaned.starts_with('+') {
        Ok(FieldValue::Text(cleaned))
    } else {
        Ok(FieldValue::Text(format!("0{cleaned}")))
    }
}

// ============================================================================
// Numbers
// ============================================================================

/// Parse a decimal exactly. Thousands separators are rejected, never guessed.
fn parse_decimal(text: &str, expected: &'static str) -> Result<Decimal, NormalizeError> {
    if text.contains(',') {
        return Err(NormalizeError::mismatch(expected, text));
    }
    Decimal::from_str_exact(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| NormalizeError::mismatch(expected, text))
}

fn normalize_decimal(raw: &JsonValue) -> Result<Decimal, NormalizeError> {
    match raw {
        JsonValue::Number(n) => parse_decimal(&n.to_string(), "decimal"),
        JsonValue::String(s) => parse_decimal(s.trim(), "decimal"),
        other => Err(NormalizeError::mismatch("decimal", other.to_string())),
    }
}

fn normalize_money(raw: &JsonValue) -> NormalizeResult {
    let amount = match raw {
        JsonValue::Number(n) => parse_decimal(&n.to_string(), "money")?,
        JsonValue::String(s) => {
            let text = s.trim().trim_start_matches(CURRENCY_SYMBOLS).trim();
            parse_decimal(text, "money")?
        }
        other => return Err(NormalizeError::mismatch("money", other.to_string())),
    };

    if amount.scale() > 2 {
        return Err(NormalizeError::out_of_range(format!(
            "money value {amount} has more than two decimal places"
        )));
    }
    if !fits_integer_digits(amount, MONEY_INTEGER_DIGITS) {
        return Err(NormalizeError::out_of_range(format!(
            "money value {amount} has more than {MONEY_INTEGER_DIGITS} integer digits"
        )));
    }
    Ok(FieldValue::Decimal(amount))
}

fn normalize_integer(raw: &JsonValue) -> NormalizeResult {
    let text = match raw {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(FieldValue::Integer(i));
            }
            n.to_string()
        }
        JsonValue::String(s) => s.trim().to_string(),
        other => return Err(NormalizeError::mismatch("integer", other.to_string())),
    };

    if let Ok(i) = text.parse::<i64>() {
        return Ok(FieldValue::Integer(i));
    }

    let value = parse_decimal(&text, "integer")?;
    if !value.fract().is_zero() {
        return Err(NormalizeError::mismatch("integer", text));
    }
    value
        .to_i64()
        .map(FieldValue::Integer)
        .ok_or_else(|| NormalizeError::out_of_range(format!("{text} does not fit in 64 bits")))
}

fn normalize_weight(raw: &JsonValue) -> NormalizeResult {
    let text = scalar_text(raw, "weight")?.to_lowercase();
    let text = text.trim_end_matches(['.', ' ']);

    let caps = WEIGHT_REGEX
        .captures(text)
        .ok_or_else(|| NormalizeError::mismatch("weight", text))?;

    let count = match caps.get(1) {
        Some(m) => parse_decimal(m.as_str(), "weight")?,
        None => Decimal::ONE,
    };
    let amount = parse_decimal(&caps[2], "weight")?;
    let factor = match caps.get(3).map(|m| m.as_str()) {
        None | Some("kg" | "l") => Decimal::ONE,
        Some("g" | "ml") => Decimal::new(1, 3),
        Some("oz") => OUNCE_IN_KG,
        Some(unit) => return Err(NormalizeError::mismatch("weight unit", unit)),
    };

    let kilograms = count
        .checked_mul(amount)
        .and_then(|total| total.checked_mul(factor))
        .ok_or_else(|| NormalizeError::out_of_range(format!("weight {text} overflows")))?
        .round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    if !fits_integer_digits(kilograms, WEIGHT_INTEGER_DIGITS) {
        return Err(NormalizeError::out_of_range(format!(
            "weight {kilograms}kg has more than {WEIGHT_INTEGER_DIGITS} integer digits"
        )));
    }
    Ok(FieldValue::Decimal(kilograms))
}

fn fits_integer_digits(value: Decimal, digits: u32) -> bool {
    value.trunc().abs() < Decimal::from(10_i64.pow(digits))
}

// ============================================================================
// Dates and times
// ============================================================================

fn normalize_date(raw: &JsonValue, formats: &[String]) -> NormalizeResult {
    let text = string_only(raw, "date")?;

    // ISO is always accepted so canonical values re-normalize to themselves
    std::iter::once("%Y-%m-%d")
        .chain(formats.iter().map(String::as_str))
        .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
        .map(FieldValue::Date)
        .ok_or_else(|| NormalizeError::unparseable_date(text))
}

fn normalize_time(raw: &JsonValue) -> NormalizeResult {
    let text = string_only(raw, "time")?;
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&text, fmt).ok())
        .map(FieldValue::Time)
        .ok_or_else(|| NormalizeError::unparseable_date(text))
}

fn normalize_expiry(raw: &JsonValue) -> NormalizeResult {
    let text = string_only(raw, "expiry date")?;

    if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        return Ok(FieldValue::Date(date));
    }

    let parsed = text
        .split_once('/')
        .filter(|(m, y)| m.len() == 2 && y.len() == 2)
        .and_then(|(m, y)| Some((m.parse::<u32>().ok()?, y.parse::<i32>().ok()?)))
        .and_then(|(month, year)| last_day_of_month(2000 + year, month));

    parsed
        .map(FieldValue::Date)
        .ok_or_else(|| NormalizeError::unparseable_date(text))
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    next.pred_opt().filter(|d| d.month() == first.month())
}

// ============================================================================
// Codes and identifiers
// ============================================================================

fn normalize_code(
    raw: &JsonValue,
    case: CasePolicy,
    allowed: &[String],
    aliases: &BTreeMap<String, String>,
) -> NormalizeResult {
    let text = scalar_text(raw, "code")?;
    let text = aliases.get(&text).cloned().unwrap_or(text);
    let cased = case.apply(&text);
    let code = aliases.get(&cased).cloned().unwrap_or(cased);

    if allowed.is_empty() || allowed.contains(&code) {
        Ok(FieldValue::Text(code))
    } else {
        Err(NormalizeError::unknown_code(text))
    }
}

fn normalize_uuid(raw: &JsonValue) -> NormalizeResult {
    let text = string_only(raw, "uuid")?.to_lowercase();
    match uuid::Uuid::from_str(&text) {
        Ok(parsed) if parsed.hyphenated().to_string() == text => Ok(FieldValue::Uuid(parsed)),
        _ => Err(NormalizeError::mismatch("hyphenated uuid", text)),
    }
}

fn normalize_boolean(raw: &JsonValue, truthy: &[String], falsy: &[String]) -> NormalizeResult {
    if let JsonValue::Bool(b) = raw {
        return Ok(FieldValue::Boolean(*b));
    }
    let text = scalar_text(raw, "boolean")?;
    if truthy.iter().any(|t| t.eq_ignore_ascii_case(&text)) {
        Ok(FieldValue::Boolean(true))
    } else if falsy.iter().any(|f| f.eq_ignore_ascii_case(&text)) {
        Ok(FieldValue::Boolean(false))
    } else {
        Err(NormalizeError::unknown_code(text))
    }
}

fn normalize_card_number(raw: &JsonValue) -> NormalizeResult {
    let text = scalar_text(raw, "card number")?;
    let digits: String = text
        .chars()
        .filter(|c| *c != '?' && !c.is_whitespace())
        .collect();

    if (8..=19).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(FieldValue::Text(digits))
    } else {
        Err(NormalizeError::mismatch("card number", text))
    }
}
