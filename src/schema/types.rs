//! Compiled schema types
//!
//! An [`EntitySchema`] is immutable once built: every name it mentions has
//! been resolved, every pattern compiled and every reference bound to the
//! referenced entity's key type.

use super::definition::{
    CheckDefinition, CrossCheckDefinition, DerivedRule, FieldDefinition, SchemaDefinition,
};
use crate::error::{Error, Result};
use crate::normalize::FieldType;
use crate::types::EntityKind;
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

// ============================================================================
// Entity Schema
// ============================================================================

/// Compiled schema for one entity kind
#[derive(Debug, Clone)]
pub struct EntitySchema {
    /// Entity kind
    pub entity: EntityKind,
    /// Target table
    pub table: String,
    /// Upsert key columns
    pub key: Vec<String>,
    /// Fields in output order
    pub fields: Vec<FieldSpec>,
    /// Checks run once every field passed
    pub cross_checks: Vec<CrossCheck>,
    /// Computed fields, appended after declared ones
    pub derived: Vec<DerivedField>,
}

impl EntitySchema {
    /// Find a declared field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Entities this schema references, without duplicates
    pub fn references(&self) -> Vec<EntityKind> {
        let mut refs: Vec<EntityKind> = Vec::new();
        for field in &self.fields {
            if let Some(target) = field.reference() {
                if !refs.contains(&target) {
                    refs.push(target);
                }
            }
        }
        refs
    }

    /// Output columns with their SQL types
    pub fn columns(&self) -> Vec<(String, &'static str)> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.field_type.sql_type()))
            .chain(
                self.derived
                    .iter()
                    .map(|d| (d.name().to_string(), d.sql_type())),
            )
            .collect()
    }

    /// Compile a declaration. `key_types` holds the key type of every entity
    /// that may be referenced.
    pub fn compile(
        definition: &SchemaDefinition,
        key_types: &BTreeMap<EntityKind, FieldType>,
    ) -> Result<Self> {
        let entity = definition.entity;
        let fail = |message: String| Error::schema(entity.as_str(), message);

        if definition.fields.is_empty() {
            return Err(fail("schema declares no fields".to_string()));
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(definition.fields.len());
        for field in &definition.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(fail(format!("field '{}' declared twice", field.name)));
            }
            fields.push(FieldSpec::compile(entity, field, key_types)?);
        }

        if definition.key.is_empty() {
            return Err(fail("schema declares no key".to_string()));
        }
        for key in &definition.key {
            match fields.iter().find(|f| &f.name == key) {
                None => return Err(fail(format!("key field '{key}' is not declared"))),
                Some(f) if f.nullable => {
                    return Err(fail(format!("key field '{key}' must not be nullable")))
                }
                Some(_) => {}
            }
        }

        let mut cross_checks = Vec::with_capacity(definition.cross_checks.len());
        for check in &definition.cross_checks {
            let compiled = match check {
                CrossCheckDefinition::NotBefore { earlier, later } => {
                    for name in [earlier, later] {
                        if !find_field(entity, &fields, name)?.field_type.is_date() {
                            return Err(fail(format!("not_before field '{name}' is not a date")));
                        }
                    }
                    CrossCheck::NotBefore {
                        earlier: earlier.clone(),
                        later: later.clone(),
                    }
                }
                CrossCheckDefinition::RequiredUnless {
                    fields: required,
                    field,
                    equals,
                } => {
                    find_field(entity, &fields, field)?;
                    for name in required {
                        find_field(entity, &fields, name)?;
                    }
                    CrossCheck::RequiredUnless {
                        fields: required.clone(),
                        field: field.clone(),
                        equals: equals.clone(),
                    }
                }
                CrossCheckDefinition::CalendarDate { year, month, day } => {
                    for name in [year, month, day] {
                        if find_field(entity, &fields, name)?.field_type != FieldType::Integer {
                            return Err(fail(format!(
                                "calendar_date field '{name}' is not an integer"
                            )));
                        }
                    }
                    CrossCheck::CalendarDate {
                        year: year.clone(),
                        month: month.clone(),
                        day: day.clone(),
                    }
                }
            };
            cross_checks.push(compiled);
        }

        let mut derived = Vec::with_capacity(definition.derived.len());
        for d in &definition.derived {
            if !seen.insert(d.name.as_str()) {
                return Err(fail(format!("derived field '{}' clashes", d.name)));
            }
            match &d.rule {
                DerivedRule::WeightClass { from } => {
                    let source = fields
                        .iter()
                        .find(|f| &f.name == from)
                        .ok_or_else(|| fail(format!("derived field reads unknown '{from}'")))?;
                    if source.field_type != FieldType::Weight {
                        return Err(fail(format!("weight_class source '{from}' is not a weight")));
                    }
                    derived.push(DerivedField::WeightClass {
                        name: d.name.clone(),
                        from: from.clone(),
                    });
                }
            }
        }

        Ok(Self {
            entity,
            table: definition
                .table
                .clone()
                .unwrap_or_else(|| entity.table_name().to_string()),
            key: definition.key.clone(),
            fields,
            cross_checks,
            derived,
        })
    }
}

/// Resolve a field named by a cross check
fn find_field<'a>(
    entity: EntityKind,
    fields: &'a [FieldSpec],
    name: &str,
) -> Result<&'a FieldSpec> {
    fields.iter().find(|f| f.name == name).ok_or_else(|| {
        Error::schema(
            entity.as_str(),
            format!("cross check names unknown field '{name}'"),
        )
    })
}

impl fmt::Display for EntitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} -> {} (key: {})",
            self.entity,
            self.table,
            self.key.join(", ")
        )?;
        for field in &self.fields {
            let null = if field.nullable { "null" } else { "not null" };
            write!(f, "  {:<24} {:<12} {:<9}", field.name, field.field_type.name(), null)?;
            if let Some(target) = field.reference() {
                write!(f, " -> {target}")?;
            }
            writeln!(f)?;
        }
        for d in &self.derived {
            writeln!(f, "  {:<24} derived", d.name())?;
        }
        Ok(())
    }
}

// ============================================================================
// Fields and predicates
// ============================================================================

/// A compiled field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Canonical column name
    pub name: String,
    /// Raw field names, in lookup order
    pub sources: Vec<String>,
    /// Whether null is admissible
    pub nullable: bool,
    /// Semantic type (references carry the resolved key type)
    pub field_type: FieldType,
    /// Single-field predicates
    pub predicates: Vec<Predicate>,
}

impl FieldSpec {
    fn compile(
        entity: EntityKind,
        definition: &FieldDefinition,
        key_types: &BTreeMap<EntityKind, FieldType>,
    ) -> Result<Self> {
        let fail = |message: String| {
            Error::schema(entity.as_str(), format!("field '{}': {message}", definition.name))
        };

        let field_type = match &definition.field_type {
            FieldType::Reference { entity: target, .. } => {
                let key = key_types
                    .get(target)
                    .ok_or_else(|| fail(format!("references unknown entity '{target}'")))?;
                FieldType::Reference {
                    entity: *target,
                    key: Some(Box::new(key.clone())),
                }
            }
            other => other.clone(),
        };

        let predicates = definition
            .checks
            .iter()
            .map(|check| Predicate::compile(check, &field_type).map_err(fail))
            .collect::<Result<Vec<_>>>()?;

        let sources = if definition.sources.is_empty() {
            vec![definition.name.clone()]
        } else {
            definition.sources.clone()
        };

        Ok(Self {
            name: definition.name.clone(),
            sources,
            nullable: definition.nullable,
            field_type,
            predicates,
        })
    }

    /// Referenced entity, if this field is a foreign key
    pub fn reference(&self) -> Option<EntityKind> {
        match self.field_type {
            FieldType::Reference { entity, .. } => Some(entity),
            _ => None,
        }
    }
}

/// Bound of a date range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// The current date when the check runs
    Today,
    /// A fixed date
    Fixed(NaiveDate),
}

impl DateBound {
    fn parse(value: &str) -> std::result::Result<Self, String> {
        if value.eq_ignore_ascii_case("today") {
            return Ok(DateBound::Today);
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(DateBound::Fixed)
            .map_err(|e| format!("invalid date bound '{value}': {e}"))
    }

    /// Resolve the bound against a reference date
    pub fn resolve(self, today: NaiveDate) -> NaiveDate {
        match self {
            DateBound::Today => today,
            DateBound::Fixed(date) => date,
        }
    }
}

/// A compiled single-field predicate
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Inclusive numeric bounds
    Range {
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
    /// Inclusive date bounds
    DateRange {
        min: Option<DateBound>,
        max: Option<DateBound>,
    },
    /// Inclusive character length bounds
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    /// Text must match
    Pattern(Regex),
    /// UUID version
    UuidVersion(usize),
}

impl Predicate {
    fn compile(check: &CheckDefinition, ty: &FieldType) -> std::result::Result<Self, String> {
        let to_decimal = |v: f64| {
            Decimal::from_f64(v).ok_or_else(|| format!("range bound {v} is not representable"))
        };

        match check {
            CheckDefinition::Range { min, max } => {
                if !ty.is_numeric() {
                    return Err(format!("range check on non-numeric type {}", ty.name()));
                }
                Ok(Predicate::Range {
                    min: min.map(to_decimal).transpose()?,
                    max: max.map(to_decimal).transpose()?,
                })
            }
            CheckDefinition::DateRange { min, max } => {
                if !ty.is_date() {
                    return Err(format!("date_range check on non-date type {}", ty.name()));
                }
                Ok(Predicate::DateRange {
                    min: min.as_deref().map(DateBound::parse).transpose()?,
                    max: max.as_deref().map(DateBound::parse).transpose()?,
                })
            }
            CheckDefinition::Length { min, max } => {
                if ty.is_numeric() || ty.is_date() {
                    return Err(format!("length check on non-text type {}", ty.name()));
                }
                Ok(Predicate::Length {
                    min: *min,
                    max: *max,
                })
            }
            CheckDefinition::Pattern(pattern) => Regex::new(pattern)
                .map(Predicate::Pattern)
                .map_err(|e| format!("invalid pattern '{pattern}': {e}")),
            CheckDefinition::UuidVersion(version) => {
                if *ty != FieldType::Uuid {
                    return Err(format!("uuid_version check on type {}", ty.name()));
                }
                Ok(Predicate::UuidVersion(*version))
            }
        }
    }
}

// ============================================================================
// Cross checks and derived fields
// ============================================================================

/// A compiled cross-field check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossCheck {
    /// `later` must not be before `earlier`
    NotBefore { earlier: String, later: String },
    /// `fields` must be non-null unless `field` equals `equals`
    RequiredUnless {
        fields: Vec<String>,
        field: String,
        equals: String,
    },
    /// year/month/day must form a real calendar date
    CalendarDate {
        year: String,
        month: String,
        day: String,
    },
}

/// A compiled derived field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedField {
    /// Shipping class from a weight in kilograms
    WeightClass { name: String, from: String },
}

impl DerivedField {
    /// Output column name
    pub fn name(&self) -> &str {
        match self {
            DerivedField::WeightClass { name, .. } => name,
        }
    }

    /// SQL column type in the warehouse
    pub fn sql_type(&self) -> &'static str {
        match self {
            DerivedField::WeightClass { .. } => "VARCHAR",
        }
    }
}
