//! YAML schema declarations
//!
//! These structs mirror the files under `schemas/` one to one. They are
//! compiled into [`EntitySchema`](super::EntitySchema) before use.

use crate::error::{Error, Result};
use crate::normalize::FieldType;
use crate::types::EntityKind;
use serde::{Deserialize, Serialize};

/// A declared entity schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Entity kind this schema describes
    pub entity: EntityKind,
    /// Target table (defaults to the entity's table)
    #[serde(default)]
    pub table: Option<String>,
    /// Upsert key columns
    pub key: Vec<String>,
    /// Declared fields, in output column order
    pub fields: Vec<FieldDefinition>,
    /// Checks that span several fields
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub cross_checks: Vec<CrossCheckDefinition>,
    /// Fields computed from accepted records
    #[serde(default)]
    pub derived: Vec<DerivedDefinition>,
}

impl SchemaDefinition {
    /// Parse a schema declaration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }
}

/// A declared field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Canonical column name
    pub name: String,
    /// Raw field names to read, first non-null wins (defaults to `name`)
    #[serde(default)]
    pub sources: Vec<String>,
    /// Whether a null value is admissible
    #[serde(default)]
    pub nullable: bool,
    /// Semantic type and its parameters
    #[serde(flatten)]
    pub field_type: FieldType,
    /// Validity predicates
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub checks: Vec<CheckDefinition>,
}

/// A declared single-field predicate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckDefinition {
    /// Inclusive numeric bounds
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Inclusive date bounds; `today` is resolved at validation time
    DateRange {
        #[serde(default)]
        min: Option<String>,
        #[serde(default)]
        max: Option<String>,
    },
    /// Inclusive character length bounds
    Length {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    /// Regular expression the text must match
    Pattern(String),
    /// Required UUID version
    UuidVersion(usize),
}

/// A declared cross-field check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossCheckDefinition {
    /// `later` must not be before `earlier`
    NotBefore { earlier: String, later: String },
    /// `fields` must be non-null unless `field` equals `equals`
    RequiredUnless {
        fields: Vec<String>,
        field: String,
        equals: String,
    },
    /// year/month/day integers must form a real calendar date
    CalendarDate {
        year: String,
        month: String,
        day: String,
    },
}

/// A declared derived field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedDefinition {
    /// Output column name
    pub name: String,
    /// How the value is computed
    #[serde(flatten)]
    pub rule: DerivedRule,
}

/// Rules for derived fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum DerivedRule {
    /// Shipping class from a weight in kilograms
    WeightClass { from: String },
}
