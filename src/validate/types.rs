//! Record and verdict types

use crate::normalize::{FieldValue, NormalizeError};
use crate::types::{EntityKind, JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Raw Record
// ============================================================================

/// One untyped source row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Zero-based position in the source
    pub position: u64,
    /// Field name to untyped value
    pub fields: JsonObject,
}

impl RawRecord {
    /// Create a raw record
    pub fn new(position: u64, fields: JsonObject) -> Self {
        Self { position, fields }
    }

    /// Build from any JSON value; non-objects become a single `value` field
    pub fn from_value(position: u64, value: JsonValue) -> Self {
        match value {
            JsonValue::Object(fields) => Self { position, fields },
            other => {
                let mut fields = JsonObject::new();
                fields.insert("value".to_string(), other);
                Self { position, fields }
            }
        }
    }

    /// Raw value of a field
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name)
    }
}

// ============================================================================
// Canonical Record
// ============================================================================

/// A fully typed record that satisfied every rule of its schema
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    entity: EntityKind,
    position: u64,
    fields: Vec<(String, FieldValue)>,
}

impl CanonicalRecord {
    pub(crate) fn new(
        entity: EntityKind,
        position: u64,
        fields: Vec<(String, FieldValue)>,
    ) -> Self {
        Self {
            entity,
            position,
            fields,
        }
    }

    /// Entity kind
    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    /// Position of the source row
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fields in schema order, derived fields last
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Value of a field
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Key string over the given columns (`|`-joined for composite keys)
    pub fn key(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.get(c).map(FieldValue::key_text).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Raw JSON form of the record
    pub fn to_json(&self) -> JsonValue {
        let map: JsonObject = self
            .fields
            .iter()
            .map(|(n, v)| (n.clone(), v.to_raw()))
            .collect();
        JsonValue::Object(map)
    }
}

// ============================================================================
// Violations
// ============================================================================

/// Why a field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    /// Value does not have the declared type
    TypeMismatch,
    /// Numeric or date value outside its bounds
    OutOfRange,
    /// Date that matches no accepted format or does not exist
    UnparseableDate,
    /// Code outside its enumerated set
    UnknownCode,
    /// Null in a non-nullable field
    MissingValue,
    /// Length, pattern or version predicate failed
    ConstraintFailed,
    /// Fields disagree with each other
    CrossFieldInconsistent,
    /// Foreign key absent from the referenced entity
    DanglingReference,
}

impl ReasonCode {
    /// Stable code used in audit logs
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::TypeMismatch => "TypeMismatch",
            ReasonCode::OutOfRange => "OutOfRange",
            ReasonCode::UnparseableDate => "UnparseableDate",
            ReasonCode::UnknownCode => "UnknownCode",
            ReasonCode::MissingValue => "MissingValue",
            ReasonCode::ConstraintFailed => "ConstraintFailed",
            ReasonCode::CrossFieldInconsistent => "CrossFieldInconsistent",
            ReasonCode::DanglingReference => "DanglingReference",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&NormalizeError> for ReasonCode {
    fn from(err: &NormalizeError) -> Self {
        match err {
            NormalizeError::TypeMismatch { .. } => ReasonCode::TypeMismatch,
            NormalizeError::OutOfRange { .. } => ReasonCode::OutOfRange,
            NormalizeError::UnparseableDate { .. } => ReasonCode::UnparseableDate,
            NormalizeError::UnknownCode { .. } => ReasonCode::UnknownCode,
        }
    }
}

/// One `(field, reason)` entry of a rejection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Field the violation is about
    pub field: String,
    /// Reason code
    pub reason: ReasonCode,
    /// Human-readable detail
    pub detail: String,
}

impl Violation {
    /// Create a violation
    pub fn new(field: impl Into<String>, reason: ReasonCode, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.reason, self.detail)
    }
}

// ============================================================================
// Rejected Record
// ============================================================================

/// A raw record paired with the complete, ordered list of its violations
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    entity: EntityKind,
    raw: RawRecord,
    violations: Vec<Violation>,
}

impl RejectedRecord {
    /// Create a rejection; `None` when there is nothing to reject for
    pub fn new(entity: EntityKind, raw: RawRecord, violations: Vec<Violation>) -> Option<Self> {
        if violations.is_empty() {
            return None;
        }
        Some(Self {
            entity,
            raw,
            violations,
        })
    }

    /// Entity kind
    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    /// The original raw record
    pub fn raw(&self) -> &RawRecord {
        &self.raw
    }

    /// Violations in field order; never empty
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Reason codes in order
    pub fn reasons(&self) -> Vec<ReasonCode> {
        self.violations.iter().map(|v| v.reason).collect()
    }
}

// ============================================================================
// Verdict
// ============================================================================

/// The validator's only output
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Record satisfied its schema
    Accepted(CanonicalRecord),
    /// Record violated its schema
    Rejected(RejectedRecord),
}

impl Verdict {
    /// Whether this is an acceptance
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    /// Whether this is a rejection
    pub fn is_rejected(&self) -> bool {
        matches!(self, Verdict::Rejected(_))
    }

    /// Position of the source row
    pub fn position(&self) -> u64 {
        match self {
            Verdict::Accepted(record) => record.position(),
            Verdict::Rejected(record) => record.raw().position,
        }
    }
}
