//! Validator engine
//!
//! One engine evaluates every schema: fields, then predicates, then
//! references, then cross checks, then derived fields.

use super::types::{CanonicalRecord, RawRecord, ReasonCode, RejectedRecord, Verdict, Violation};
use crate::normalize::{normalize, FieldValue};
use crate::schema::{CrossCheck, DerivedField, EntitySchema, FieldSpec, Predicate};
use crate::types::{EntityKind, JsonValue};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Validate one raw record against a schema, without referential checks
pub fn validate(raw: RawRecord, schema: &EntitySchema) -> Verdict {
    Validator::new(Arc::new(schema.clone())).validate(raw)
}

/// Validates records of one entity kind
#[derive(Debug, Clone)]
pub struct Validator {
    schema: Arc<EntitySchema>,
    references: HashMap<EntityKind, Arc<HashSet<String>>>,
    today: NaiveDate,
}

impl Validator {
    /// Create a validator for a schema
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            references: HashMap::new(),
            today: Local::now().date_naive(),
        }
    }

    /// Check reference fields against these key sets. Targets without a
    /// key set are not checked.
    #[must_use]
    pub fn with_references(
        mut self,
        references: HashMap<EntityKind, Arc<HashSet<String>>>,
    ) -> Self {
        self.references = references;
        self
    }

    /// Resolve `today` date bounds against a fixed date
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Schema this validator applies
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// Produce exactly one verdict for a raw record
    pub fn validate(&self, raw: RawRecord) -> Verdict {
        let mut violations = Vec::new();
        let mut values = Vec::with_capacity(self.schema.fields.len() + self.schema.derived.len());

        for field in &self.schema.fields {
            let value = match normalize(first_present(&raw, field), &field.field_type) {
                Ok(value) => value,
                Err(e) => {
                    let reason = ReasonCode::from(&e);
                    violations.push(Violation::new(&field.name, reason, e.to_string()));
                    values.push((field.name.clone(), FieldValue::Null));
                    continue;
                }
            };

            if value.is_null() {
                if !field.nullable {
                    violations.push(Violation::new(
                        &field.name,
                        ReasonCode::MissingValue,
                        "value is required",
                    ));
                }
            } else {
                self.check_predicates(field, &value, &mut violations);
                self.check_reference(field, &value, &mut violations);
            }
            values.push((field.name.clone(), value));
        }

        if violations.is_empty() {
            for check in &self.schema.cross_checks {
                if let Some(violation) = cross_check(check, &values) {
                    violations.push(violation);
                }
            }
        }

        let position = raw.position;
        match RejectedRecord::new(self.schema.entity, raw, violations) {
            Some(rejected) => Verdict::Rejected(rejected),
            None => {
                for derived in &self.schema.derived {
                    let value = derive(derived, &values);
                    values.push((derived.name().to_string(), value));
                }
                Verdict::Accepted(CanonicalRecord::new(self.schema.entity, position, values))
            }
        }
    }

    fn check_predicates(
        &self,
        field: &FieldSpec,
        value: &FieldValue,
        violations: &mut Vec<Violation>,
    ) {
        for predicate in &field.predicates {
            let failed = match predicate {
                Predicate::Range { min, max } => value.as_decimal().and_then(|n| {
                    outside(n, *min, *max).then(|| {
                        (
                            ReasonCode::OutOfRange,
                            format!("{n} outside {}", bounds(min, max)),
                        )
                    })
                }),
                Predicate::DateRange { min, max } => value.as_date().and_then(|d| {
                    let lo = min.map(|b| b.resolve(self.today));
                    let hi = max.map(|b| b.resolve(self.today));
                    outside(d, lo, hi).then(|| {
                        (
                            ReasonCode::OutOfRange,
                            format!("{d} outside {}", bounds(&lo, &hi)),
                        )
                    })
                }),
                Predicate::Length { min, max } => {
                    let len = value.key_text().chars().count();
                    outside(len, *min, *max).then(|| {
                        (
                            ReasonCode::ConstraintFailed,
                            format!("length {len} outside {}", bounds(min, max)),
                        )
                    })
                }
                Predicate::Pattern(regex) => {
                    let text = value.key_text();
                    (!regex.is_match(&text)).then(|| {
                        (
                            ReasonCode::ConstraintFailed,
                            format!("'{text}' does not match {}", regex.as_str()),
                        )
                    })
                }
                Predicate::UuidVersion(version) => match value {
                    FieldValue::Uuid(uuid) if uuid.get_version_num() != *version => Some((
                        ReasonCode::ConstraintFailed,
                        format!("uuid version {} is not {version}", uuid.get_version_num()),
                    )),
                    _ => None,
                },
            };

            if let Some((reason, detail)) = failed {
                violations.push(Violation::new(&field.name, reason, detail));
            }
        }
    }

    fn check_reference(
        &self,
        field: &FieldSpec,
        value: &FieldValue,
        violations: &mut Vec<Violation>,
    ) {
        let Some(target) = field.reference() else {
            return;
        };
        let Some(keys) = self.references.get(&target) else {
            return;
        };
        let key = value.key_text();
        if !keys.contains(&key) {
            violations.push(Violation::new(
                &field.name,
                ReasonCode::DanglingReference,
                format!("'{key}' is not a known {target}"),
            ));
        }
    }
}

/// First non-null raw value among a field's sources
fn first_present<'a>(raw: &'a RawRecord, field: &FieldSpec) -> &'a JsonValue {
    static NULL: JsonValue = JsonValue::Null;
    field
        .sources
        .iter()
        .filter_map(|source| raw.get(source))
        .find(|value| !crate::normalize::is_null_token(value))
        .unwrap_or(&NULL)
}

fn outside<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_some_and(|lo| value < lo) || max.is_some_and(|hi| value > hi)
}

fn bounds<T: std::fmt::Display>(min: &Option<T>, max: &Option<T>) -> String {
    let show = |b: &Option<T>| b.as_ref().map_or_else(|| "..".to_string(), ToString::to_string);
    format!("[{}, {}]", show(min), show(max))
}

fn lookup<'a>(values: &'a [(String, FieldValue)], name: &str) -> &'a FieldValue {
    static NULL: FieldValue = FieldValue::Null;
    values
        .iter()
        .find(|(n, _)| n == name)
        .map_or(&NULL, |(_, v)| v)
}

fn cross_check(check: &CrossCheck, values: &[(String, FieldValue)]) -> Option<Violation> {
    match check {
        CrossCheck::NotBefore { earlier, later } => {
            let (Some(start), Some(end)) = (
                lookup(values, earlier).as_date(),
                lookup(values, later).as_date(),
            ) else {
                return None;
            };
            (end < start).then(|| {
                Violation::new(
                    later,
                    ReasonCode::CrossFieldInconsistent,
                    format!("{later} {end} is before {earlier} {start}"),
                )
            })
        }
        CrossCheck::RequiredUnless {
            fields,
            field,
            equals,
        } => {
            if lookup(values, field).key_text() == *equals {
                return None;
            }
            let missing: Vec<&str> = fields
                .iter()
                .filter(|name| lookup(values, name).is_null())
                .map(String::as_str)
                .collect();
            (!missing.is_empty()).then(|| {
                Violation::new(
                    missing.join(","),
                    ReasonCode::CrossFieldInconsistent,
                    format!("required unless {field} is '{equals}'"),
                )
            })
        }
        CrossCheck::CalendarDate { year, month, day } => {
            let part = |name: &str| match lookup(values, name) {
                FieldValue::Integer(n) => Some(*n),
                _ => None,
            };
            let (Some(y), Some(m), Some(d)) = (part(year), part(month), part(day)) else {
                return None;
            };
            let valid = i32::try_from(y)
                .ok()
                .zip(u32::try_from(m).ok())
                .zip(u32::try_from(d).ok())
                .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
                .is_some();
            (!valid).then(|| {
                Violation::new(
                    day,
                    ReasonCode::CrossFieldInconsistent,
                    format!("{y}-{m}-{d} is not a calendar date"),
                )
            })
        }
    }
}

fn derive(derived: &DerivedField, values: &[(String, FieldValue)]) -> FieldValue {
    match derived {
        DerivedField::WeightClass { from, .. } => lookup(values, from)
            .as_decimal()
            .map_or(FieldValue::Null, |kg| FieldValue::Text(weight_class(kg).to_string())),
    }
}

/// Shipping class of a weight in kilograms
pub fn weight_class(kg: Decimal) -> &'static str {
    if kg < Decimal::from(2) {
        "Light"
    } else if kg < Decimal::from(40) {
        "Mid_Sized"
    } else if kg < Decimal::from(140) {
        "Heavy"
    } else {
        "Truck_Required"
    }
}
