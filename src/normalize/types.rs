//! Normalizer types
//!
//! Semantic field types, typed field values and normalization failures.

use crate::types::{CasePolicy, EntityKind, JsonValue};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Field Type
// ============================================================================

/// Semantic type of a schema field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// Free text, trimmed and case-normalized
    Text {
        #[serde(default)]
        case: CasePolicy,
    },
    /// Person name: letters, hyphens, apostrophes, spaces, optional final period
    PersonName,
    /// Email address
    Email,
    /// Postal address with street abbreviations expanded
    Address,
    /// Phone number in national or international form
    Phone,
    /// Currency amount with at most two decimal places
    Money,
    /// Arbitrary precision decimal (coordinates, ratios)
    Decimal,
    /// Whole number
    Integer,
    /// Calendar date parsed from an enumerated set of formats
    Date {
        #[serde(default = "default_date_formats")]
        formats: Vec<String>,
    },
    /// Time of day
    Time,
    /// Card expiry, `MM/YY`, resolved to the last day of that month
    ExpiryDate,
    /// Enumerated code
    Code {
        #[serde(default)]
        case: CasePolicy,
        #[serde(default)]
        allowed: Vec<String>,
        #[serde(default)]
        aliases: BTreeMap<String, String>,
    },
    /// Hyphenated UUID in canonical lower case
    Uuid,
    /// Boolean from configurable tokens
    Boolean {
        #[serde(default = "default_truthy")]
        truthy: Vec<String>,
        #[serde(default = "default_falsy")]
        falsy: Vec<String>,
    },
    /// Weight converted to kilograms
    Weight,
    /// Card number, digits only
    CardNumber,
    /// Foreign key to another entity, normalized like that entity's key
    Reference {
        entity: EntityKind,
        /// Resolved when the schema registry is built
        #[serde(skip)]
        key: Option<Box<FieldType>>,
    },
}

/// Date formats accepted when a schema does not list its own
pub fn default_date_formats() -> Vec<String> {
    ["%Y-%m-%d", "%Y/%m/%d", "%Y %B %d", "%B %Y %d", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_truthy() -> Vec<String> {
    ["true", "yes", "y", "t", "1"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_falsy() -> Vec<String> {
    ["false", "no", "n", "f", "0"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl FieldType {
    /// Short name used in violation details
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text { .. } => "text",
            FieldType::PersonName => "person_name",
            FieldType::Email => "email",
            FieldType::Address => "address",
            FieldType::Phone => "phone",
            FieldType::Money => "money",
            FieldType::Decimal => "decimal",
            FieldType::Integer => "integer",
            FieldType::Date { .. } => "date",
            FieldType::Time => "time",
            FieldType::ExpiryDate => "expiry_date",
            FieldType::Code { .. } => "code",
            FieldType::Uuid => "uuid",
            FieldType::Boolean { .. } => "boolean",
            FieldType::Weight => "weight",
            FieldType::CardNumber => "card_number",
            FieldType::Reference { .. } => "reference",
        }
    }

    /// SQL column type in the warehouse
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Money => "DECIMAL(12,2)",
            FieldType::Decimal => "DOUBLE",
            FieldType::Weight => "DECIMAL(12,3)",
            FieldType::Integer => "BIGINT",
            FieldType::Date { .. } | FieldType::ExpiryDate => "DATE",
            FieldType::Time => "TIME",
            FieldType::Uuid => "UUID",
            FieldType::Boolean { .. } => "BOOLEAN",
            FieldType::Reference { key: Some(key), .. } => key.sql_type(),
            _ => "VARCHAR",
        }
    }

    /// Whether values of this type are ordered numbers
    pub fn is_numeric(&self) -> bool {
        match self {
            FieldType::Money | FieldType::Decimal | FieldType::Integer | FieldType::Weight => true,
            FieldType::Reference { key: Some(key), .. } => key.is_numeric(),
            _ => false,
        }
    }

    /// Whether values of this type are dates
    pub fn is_date(&self) -> bool {
        match self {
            FieldType::Date { .. } | FieldType::ExpiryDate => true,
            FieldType::Reference { key: Some(key), .. } => key.is_date(),
            _ => false,
        }
    }
}

// ============================================================================
// Field Value
// ============================================================================

/// A normalized, typed field value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    /// Absent value
    Null,
    /// Text, codes, card numbers, phone numbers
    Text(String),
    /// Whole number
    Integer(i64),
    /// Money, coordinates, weights
    Decimal(Decimal),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Boolean flag
    Boolean(bool),
    /// UUID
    Uuid(uuid::Uuid),
}

impl FieldValue {
    /// Whether the value is absent
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Raw JSON form, accepted again by the same normalization rule
    pub fn to_raw(&self) -> JsonValue {
        match self {
            FieldValue::Null => JsonValue::Null,
            FieldValue::Text(s) => JsonValue::String(s.clone()),
            FieldValue::Integer(i) => JsonValue::Number((*i).into()),
            FieldValue::Decimal(d) => JsonValue::String(d.to_string()),
            FieldValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Time(t) => JsonValue::String(t.format("%H:%M:%S").to_string()),
            FieldValue::Boolean(b) => JsonValue::Bool(*b),
            FieldValue::Uuid(u) => JsonValue::String(u.hyphenated().to_string()),
        }
    }

    /// Text handed to the warehouse as a bind parameter (`None` for NULL)
    pub fn to_sql_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Boolean(b) => Some(b.to_string()),
            other => match other.to_raw() {
                JsonValue::String(s) => Some(s),
                value => Some(value.to_string()),
            },
        }
    }

    /// Key form used for reference lookups
    pub fn key_text(&self) -> String {
        self.to_sql_text().unwrap_or_default()
    }

    /// Numeric view of the value, if it has one
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Decimal(d) => Some(*d),
            FieldValue::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    /// Date view of the value, if it has one
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Text view of the value, if it has one
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_sql_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

// ============================================================================
// Normalize Error
// ============================================================================

/// A typed normalization failure for one field value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("expected {expected}, found '{found}'")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("{message}")]
    OutOfRange { message: String },

    #[error("unparseable date '{value}'")]
    UnparseableDate { value: String },

    #[error("unknown code '{value}'")]
    UnknownCode { value: String },
}

impl NormalizeError {
    /// Create a type mismatch error
    pub fn mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected,
            found: found.into(),
        }
    }

    /// Create an out of range error
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::OutOfRange {
            message: message.into(),
        }
    }

    /// Create an unparseable date error
    pub fn unparseable_date(value: impl Into<String>) -> Self {
        Self::UnparseableDate {
            value: value.into(),
        }
    }

    /// Create an unknown code error
    pub fn unknown_code(value: impl Into<String>) -> Self {
        Self::UnknownCode {
            value: value.into(),
        }
    }
}
