//! Schema registry
//!
//! Holds one compiled schema per entity kind and the dependency order
//! derived from their references. Built once at startup, read-only after.

use super::builtin::BUILTIN_SCHEMAS;
use super::definition::SchemaDefinition;
use super::types::EntitySchema;
use crate::error::{Error, Result};
use crate::normalize::FieldType;
use crate::types::EntityKind;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Compiled schemas plus their fixed dependency order
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<EntityKind, Arc<EntitySchema>>,
    dependencies: BTreeMap<EntityKind, Vec<EntityKind>>,
    order: Vec<EntityKind>,
}

impl SchemaRegistry {
    /// Registry of the built-in schemas
    pub fn builtin() -> Result<Self> {
        let definitions = BUILTIN_SCHEMAS
            .values()
            .map(|yaml| SchemaDefinition::from_yaml(yaml))
            .collect::<Result<Vec<_>>>()?;
        Self::from_definitions(definitions)
    }

    /// Built-in schemas, with any `*.yaml` in `dir` replacing the built-in
    /// declaration of the same entity
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut definitions: BTreeMap<EntityKind, SchemaDefinition> = BTreeMap::new();
        for yaml in BUILTIN_SCHEMAS.values() {
            let def = SchemaDefinition::from_yaml(yaml)?;
            definitions.insert(def.entity, def);
        }

        if let Some(dir) = dir {
            let entries = std::fs::read_dir(dir).map_err(|e| {
                Error::config(format!("Failed to read schemas dir {}: {e}", dir.display()))
            })?;
            let mut paths: Vec<_> = entries
                .filter_map(std::result::Result::ok)
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "yaml" || ext == "yml"))
                .collect();
            paths.sort();

            for path in paths {
                let content = std::fs::read_to_string(&path)?;
                let def = SchemaDefinition::from_yaml(&content).map_err(|e| {
                    Error::schema(path.display().to_string(), format!("malformed schema: {e}"))
                })?;
                debug!("Schema for {} overridden by {}", def.entity, path.display());
                definitions.insert(def.entity, def);
            }
        }

        Self::from_definitions(definitions.into_values().collect())
    }

    /// Compile a set of declarations. Malformed schemas, unknown references
    /// and reference cycles are errors.
    pub fn from_definitions(definitions: Vec<SchemaDefinition>) -> Result<Self> {
        let mut by_kind: BTreeMap<EntityKind, SchemaDefinition> = BTreeMap::new();
        for def in definitions {
            let kind = def.entity;
            if by_kind.insert(kind, def).is_some() {
                return Err(Error::schema(kind.as_str(), "declared more than once"));
            }
        }

        // Only single-column keys can be referenced
        let key_types: BTreeMap<EntityKind, FieldType> = by_kind
            .iter()
            .filter_map(|(kind, def)| match def.key.as_slice() {
                [single] => def
                    .fields
                    .iter()
                    .find(|f| &f.name == single)
                    .map(|f| (*kind, f.field_type.clone())),
                _ => None,
            })
            .collect();

        let mut schemas = BTreeMap::new();
        let mut dependencies = BTreeMap::new();
        for (kind, def) in &by_kind {
            let schema = EntitySchema::compile(def, &key_types)?;
            dependencies.insert(*kind, schema.references());
            schemas.insert(*kind, Arc::new(schema));
        }

        let order = topological_order(&dependencies)?;
        debug!(
            "Dependency order: {}",
            order
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(Self {
            schemas,
            dependencies,
            order,
        })
    }

    /// Compiled schema for an entity kind
    pub fn get(&self, kind: EntityKind) -> Option<&Arc<EntitySchema>> {
        self.schemas.get(&kind)
    }

    /// Compiled schema for an entity kind, or a schema error
    pub fn require(&self, kind: EntityKind) -> Result<Arc<EntitySchema>> {
        self.get(kind)
            .cloned()
            .ok_or_else(|| Error::schema(kind.as_str(), "no schema registered"))
    }

    /// Entity kinds in dependency order (referenced entities first)
    pub fn dependency_order(&self) -> &[EntityKind] {
        &self.order
    }

    /// Entities a kind references
    pub fn dependencies_of(&self, kind: EntityKind) -> &[EntityKind] {
        self.dependencies.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Whether any schema references this kind
    pub fn is_referenced(&self, kind: EntityKind) -> bool {
        self.dependencies.values().any(|deps| deps.contains(&kind))
    }

    /// Registered entity kinds
    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.schemas.keys().copied()
    }
}

/// Kahn's algorithm; ties are broken by entity declaration order so the
/// result is stable across runs
fn topological_order(
    dependencies: &BTreeMap<EntityKind, Vec<EntityKind>>,
) -> Result<Vec<EntityKind>> {
    let mut remaining: BTreeMap<EntityKind, usize> = dependencies
        .iter()
        .map(|(kind, deps)| (*kind, deps.len()))
        .collect();

    for (kind, deps) in dependencies {
        if deps.contains(kind) {
            return Err(Error::schema(kind.as_str(), "schema references itself"));
        }
    }

    let mut ready: BTreeSet<EntityKind> = remaining
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(k, _)| *k)
        .collect();
    let mut order = Vec::with_capacity(dependencies.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for (kind, deps) in dependencies {
            if deps.contains(&next) {
                if let Some(n) = remaining.get_mut(kind) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(*kind);
                    }
                }
            }
        }
    }

    if order.len() == dependencies.len() {
        Ok(order)
    } else {
        let cyclic: Vec<&str> = remaining
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(k, _)| k.as_str())
            .collect();
        Err(Error::schema(
            cyclic.join(", "),
            "reference cycle between schemas",
        ))
    }
}
