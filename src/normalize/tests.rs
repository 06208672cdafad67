//! Tests for normalize module

use super::*;
use crate::types::{CasePolicy, EntityKind};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use test_case::test_case;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date_type() -> FieldType {
    FieldType::Date {
        formats: default_date_formats(),
    }
}

fn country_code_type() -> FieldType {
    let mut aliases = BTreeMap::new();
    aliases.insert("GGB".to_string(), "GB".to_string());
    FieldType::Code {
        case: CasePolicy::Upper,
        allowed: vec!["GB".to_string(), "DE".to_string(), "US".to_string()],
        aliases,
    }
}

// ============================================================================
// Null handling
// ============================================================================

#[test_case(json!(null) ; "json null")]
#[test_case(json!("") ; "empty string")]
#[test_case(json!("  ") ; "blank string")]
#[test_case(json!("NULL") ; "null token")]
#[test_case(json!("N/A") ; "not available token")]
#[test_case(json!("n/a") ; "lowercase not available")]
fn test_null_tokens(raw: Value) {
    assert_eq!(normalize(&raw, &FieldType::Money).unwrap(), FieldValue::Null);
    assert_eq!(normalize(&raw, &date_type()).unwrap(), FieldValue::Null);
}

// ============================================================================
// Money and numbers
// ============================================================================

#[test_case(json!("19.99"), "19.99" ; "plain string")]
#[test_case(json!("£19.99"), "19.99" ; "pound prefix")]
#[test_case(json!(" $5 "), "5" ; "dollar prefix with spaces")]
#[test_case(json!(19.99), "19.99" ; "json number")]
#[test_case(json!("-3.50"), "-3.50" ; "negative keeps scale")]
#[test_case(json!("£9999999999.99"), "9999999999.99" ; "widest column value")]
fn test_money_accepts(raw: Value, expected: &str) {
    assert_eq!(
        normalize(&raw, &FieldType::Money).unwrap(),
        FieldValue::Decimal(dec(expected))
    );
}

#[test]
fn test_money_rejects_thousands_separator() {
    let err = normalize(&json!("1,299.00"), &FieldType::Money).unwrap_err();
    assert!(matches!(err, NormalizeError::TypeMismatch { .. }));
}

#[test]
fn test_money_rejects_sub_penny_precision() {
    let err = normalize(&json!("1.999"), &FieldType::Money).unwrap_err();
    assert!(matches!(err, NormalizeError::OutOfRange { .. }));
}

#[test_case(json!("£99999999999.99") ; "eleven integer digits")]
#[test_case(json!("-10000000000") ; "negative eleven integer digits")]
fn test_money_rejects_values_wider_than_column(raw: Value) {
    let err = normalize(&raw, &FieldType::Money).unwrap_err();
    assert!(matches!(err, NormalizeError::OutOfRange { .. }));
}

#[test]
fn test_money_rejects_garbage() {
    let err = normalize(&json!("ABC"), &FieldType::Money).unwrap_err();
    assert!(matches!(err, NormalizeError::TypeMismatch { .. }));
}

#[test_case(json!(3), 3 ; "json integer")]
#[test_case(json!("3"), 3 ; "string integer")]
#[test_case(json!(" 42 "), 42 ; "padded string")]
#[test_case(json!(3.0), 3 ; "integral float")]
#[test_case(json!("7.00"), 7 ; "integral decimal string")]
fn test_integer_accepts(raw: Value, expected: i64) {
    assert_eq!(
        normalize(&raw, &FieldType::Integer).unwrap(),
        FieldValue::Integer(expected)
    );
}

#[test_case(json!("J78") ; "letters")]
#[test_case(json!("3.5") ; "fractional")]
#[test_case(json!("1,000") ; "thousands separator")]
fn test_integer_rejects(raw: Value) {
    let err = normalize(&raw, &FieldType::Integer).unwrap_err();
    assert!(matches!(err, NormalizeError::TypeMismatch { .. }));
}

#[test]
fn test_integer_overflow_is_out_of_range() {
    let err = normalize(&json!("99999999999999999999999"), &FieldType::Integer).unwrap_err();
    assert!(matches!(err, NormalizeError::OutOfRange { .. }));
}

#[test]
fn test_decimal_coordinates() {
    assert_eq!(
        normalize(&json!("-0.1276"), &FieldType::Decimal).unwrap(),
        FieldValue::Decimal(dec("-0.1276"))
    );
    assert_eq!(
        normalize(&json!(51.5072), &FieldType::Decimal).unwrap(),
        FieldValue::Decimal(dec("51.5072"))
    );
}

// ============================================================================
// Weight
// ============================================================================

#[test_case("1.6kg", "1.6" ; "kilograms")]
#[test_case("590g", "0.59" ; "grams")]
#[test_case("100ml", "0.1" ; "millilitres")]
#[test_case("16oz", "0.454" ; "ounces")]
#[test_case("12 x 100g", "1.2" ; "multipack")]
#[test_case("77g .", "0.077" ; "trailing junk")]
#[test_case("2", "2" ; "bare number is kilograms")]
#[test_case("999999999kg", "999999999" ; "widest column value")]
fn test_weight(raw: &str, expected: &str) {
    assert_eq!(
        normalize(&json!(raw), &FieldType::Weight).unwrap(),
        FieldValue::Decimal(dec(expected))
    );
}

#[test]
fn test_weight_rejects_unknown_unit() {
    let err = normalize(&json!("3 stone"), &FieldType::Weight).unwrap_err();
    assert!(matches!(err, NormalizeError::TypeMismatch { .. }));
}

#[test_case("99999999999999999999 x 99999999999999999999kg" ; "multipack overflow")]
#[test_case("1000000000kg" ; "ten integer digits")]
#[test_case("2000000 x 1000kg" ; "multipack wider than column")]
fn test_weight_out_of_range(raw: &str) {
    let err = normalize(&json!(raw), &FieldType::Weight).unwrap_err();
    assert!(matches!(err, NormalizeError::OutOfRange { .. }));
}

// ============================================================================
// Dates
// ============================================================================

#[test_case("2021-02-03" ; "iso")]
#[test_case("2021/02/03" ; "slashes")]
#[test_case("2021 February 03" ; "year month day words")]
#[test_case("February 2021 03" ; "month year day words")]
#[test_case("2021-02-03 10:15:00" ; "timestamp")]
fn test_date_formats(raw: &str) {
    assert_eq!(
        normalize(&json!(raw), &date_type()).unwrap(),
        FieldValue::Date(NaiveDate::from_ymd_opt(2021, 2, 3).unwrap())
    );
}

#[test]
fn test_invalid_calendar_date_is_unparseable() {
    let err = normalize(&json!("2021-02-30"), &date_type()).unwrap_err();
    assert_eq!(
        err,
        NormalizeError::UnparseableDate {
            value: "2021-02-30".to_string()
        }
    );
}

#[test]
fn test_unknown_date_format_is_unparseable() {
    let err = normalize(&json!("03.02.2021"), &date_type()).unwrap_err();
    assert!(matches!(err, NormalizeError::UnparseableDate { .. }));
}

#[test]
fn test_expiry_date_is_last_day_of_month() {
    assert_eq!(
        normalize(&json!("02/24"), &FieldType::ExpiryDate).unwrap(),
        FieldValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
    );
    assert_eq!(
        normalize(&json!("12/26"), &FieldType::ExpiryDate).unwrap(),
        FieldValue::Date(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap())
    );
}

#[test]
fn test_expiry_date_rejects_month_13() {
    let err = normalize(&json!("13/24"), &FieldType::ExpiryDate).unwrap_err();
    assert!(matches!(err, NormalizeError::UnparseableDate { .. }));
}

#[test]
fn test_time() {
    let value = normalize(&json!("22:00:06"), &FieldType::Time).unwrap();
    assert_eq!(value.to_raw(), json!("22:00:06"));
    assert!(normalize(&json!("25:00:00"), &FieldType::Time).is_err());
}

// ============================================================================
// Codes
// ============================================================================

#[test]
fn test_country_code_upper_cased() {
    assert_eq!(
        normalize(&json!("gb"), &country_code_type()).unwrap(),
        FieldValue::Text("GB".to_string())
    );
}

#[test]
fn test_country_code_alias() {
    assert_eq!(
        normalize(&json!("GGB"), &country_code_type()).unwrap(),
        FieldValue::Text("GB".to_string())
    );
}

#[test]
fn test_unknown_code() {
    let err = normalize(&json!("FR"), &country_code_type()).unwrap_err();
    assert_eq!(
        err,
        NormalizeError::UnknownCode {
            value: "FR".to_string()
        }
    );
}

#[test]
fn test_boolean_tokens() {
    let ty = FieldType::Boolean {
        truthy: vec!["Still_avaliable".to_string()],
        falsy: vec!["Removed".to_string()],
    };
    assert_eq!(
        normalize(&json!("Still_avaliable"), &ty).unwrap(),
        FieldValue::Boolean(true)
    );
    assert_eq!(
        normalize(&json!("removed"), &ty).unwrap(),
        FieldValue::Boolean(false)
    );
    assert!(matches!(
        normalize(&json!("maybe"), &ty).unwrap_err(),
        NormalizeError::UnknownCode { .. }
    ));
}

#[test]
fn test_uuid_canonical_lowercase() {
    let value = normalize(
        &json!(" 93CAF182-E4E9-4C6E-BEBB-60A1A9DCF9B8 "),
        &FieldType::Uuid,
    )
    .unwrap();
    assert_eq!(value.to_raw(), json!("93caf182-e4e9-4c6e-bebb-60a1a9dcf9b8"));
}

#[test]
fn test_uuid_rejects_simple_form() {
    let err = normalize(&json!("93caf182e4e94c6ebebb60a1a9dcf9b8"), &FieldType::Uuid).unwrap_err();
    assert!(matches!(err, NormalizeError::TypeMismatch { .. }));
}

#[test]
fn test_card_number_strips_question_marks() {
    assert_eq!(
        normalize(&json!("??4971858637664481"), &FieldType::CardNumber).unwrap(),
        FieldValue::Text("4971858637664481".to_string())
    );
    assert_eq!(
        normalize(&json!(4_971_858_637_664_481_u64), &FieldType::CardNumber).unwrap(),
        FieldValue::Text("4971858637664481".to_string())
    );
    assert!(normalize(&json!("NB71VBAHJE"), &FieldType::CardNumber).is_err());
}

#[test]
fn test_reference_uses_key_type() {
    let ty = FieldType::Reference {
        entity: EntityKind::User,
        key: Some(Box::new(FieldType::Uuid)),
    };
    assert!(normalize(&json!("not-a-uuid"), &ty).is_err());
}

// ============================================================================
// Strings
// ============================================================================

#[test_case("Anne-Marie" ; "hyphen")]
#[test_case("O'Neil" ; "apostrophe")]
#[test_case("Jean Luc" ; "space")]
#[test_case("Müller" ; "non ascii letter")]
#[test_case("Jr." ; "trailing period")]
fn test_person_name_accepts(raw: &str) {
    assert_eq!(
        normalize(&json!(raw), &FieldType::PersonName).unwrap(),
        FieldValue::Text(raw.to_string())
    );
}

#[test]
fn test_person_name_rejects_digits() {
    assert!(normalize(&json!("R2D2"), &FieldType::PersonName).is_err());
}

#[test]
fn test_email_double_at() {
    assert_eq!(
        normalize(&json!("jane@@example.com"), &FieldType::Email).unwrap(),
        FieldValue::Text("jane@example.com".to_string())
    );
    assert!(normalize(&json!("jane.example.com"), &FieldType::Email).is_err());
    assert!(normalize(&json!("jane doe@example.com"), &FieldType::Email).is_err());
}

#[test]
fn test_address_cleanup() {
    assert_eq!(
        normalize(&json!("12 high st.\nLONDON  W1 1AA"), &FieldType::Address).unwrap(),
        FieldValue::Text("12 High Street, London W1 1Aa".to_string())
    );
    assert_eq!(
        normalize(&json!("5 Park Ave, Leeds"), &FieldType::Address).unwrap(),
        FieldValue::Text("5 Park Avenue, Leeds".to_string())
    );
    assert_eq!(
        normalize(&json!("9 Station Avenue"), &FieldType::Address).unwrap(),
        FieldValue::Text("9 Station Avenue".to_string())
    );
}

#[test_case("+44(0)20 7946 0000", "020 7946 0000" ; "international with trunk prefix")]
#[test_case("(0161) 496 0000", "0161 496 0000" ; "parenthesised area code")]
#[test_case("0306 999.0871", "0306 9990871" ; "dots removed")]
#[test_case("+49 30 901820", "+49 30 901820" ; "international kept")]
#[test_case("7700 900123", "07700 900123" ; "missing trunk zero")]
fn test_phone(raw: &str, expected: &str) {
    assert_eq!(
        normalize(&json!(raw), &FieldType::Phone).unwrap(),
        FieldValue::Text(expected.to_string())
    );
}

#[test]
fn test_phone_rejects_words() {
    assert!(normalize(&json!("call me"), &FieldType::Phone).is_err());
}

#[test]
fn test_text_case_policy() {
    let ty = FieldType::Text {
        case: CasePolicy::Title,
    };
    assert_eq!(
        normalize(&json!("  super store "), &ty).unwrap(),
        FieldValue::Text("Super Store".to_string())
    );
}

// ============================================================================
// Idempotence
// ============================================================================

#[test_case(json!("£19.99"), FieldType::Money ; "money")]
#[test_case(json!("12 x 100g"), FieldType::Weight ; "weight")]
#[test_case(json!("2021 February 03"), date_type() ; "date")]
#[test_case(json!("09/27"), FieldType::ExpiryDate ; "expiry")]
#[test_case(json!("ggb"), country_code_type() ; "code")]
#[test_case(json!("12 high st.\nleeds"), FieldType::Address ; "address")]
#[test_case(json!("+44(0)20 7946 0000"), FieldType::Phone ; "phone")]
#[test_case(json!("A7B8E6C2-09B4-4C52-9D73-1C7D0B2F1E3A"), FieldType::Uuid ; "uuid")]
#[test_case(
    json!("Removed"),
    FieldType::Boolean { truthy: vec!["Still_avaliable".into()], falsy: vec!["Removed".into()] }
    ; "boolean"
)]
#[test_case(json!("??4971858637664481"), FieldType::CardNumber ; "card number")]
#[test_case(json!("7.00"), FieldType::Integer ; "integer")]
#[test_case(json!("22:00"), FieldType::Time ; "time")]
fn test_normalization_is_idempotent(raw: Value, ty: FieldType) {
    let once = normalize(&raw, &ty).unwrap();
    let twice = normalize(&once.to_raw(), &ty).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_sql_text() {
    assert_eq!(FieldValue::Null.to_sql_text(), None);
    assert_eq!(
        FieldValue::Boolean(true).to_sql_text(),
        Some("true".to_string())
    );
    assert_eq!(
        FieldValue::Decimal(dec("19.99")).to_sql_text(),
        Some("19.99".to_string())
    );
    assert_eq!(FieldValue::Integer(3).to_sql_text(), Some("3".to_string()));
}
