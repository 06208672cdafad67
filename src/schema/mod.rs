//! Entity schemas
//!
//! Each entity kind is described by a declarative table of fields (name,
//! semantic type, nullability, predicates) plus cross-field checks and
//! derived fields. Declarations are YAML, embedded from `schemas/` and
//! optionally overridden from a directory at startup. They are compiled
//! once into immutable [`EntitySchema`]s held by a [`SchemaRegistry`],
//! which also fixes the dependency order between entity kinds.
//!
//! ```yaml
//! entity: order
//! key: [date_uuid, product_code]
//! fields:
//!   - name: user_uuid
//!     type: reference
//!     entity: user
//!   - name: product_quantity
//!     type: integer
//!     checks:
//!       - range: { min: 1 }
//! ```

mod builtin;
mod definition;
mod registry;
mod types;

pub use builtin::{get_builtin, BUILTIN_SCHEMAS};
pub use definition::{
    CheckDefinition, CrossCheckDefinition, DerivedDefinition, DerivedRule, FieldDefinition,
    SchemaDefinition,
};
pub use registry::SchemaRegistry;
pub use types::{CrossCheck, DateBound, DerivedField, EntitySchema, FieldSpec, Predicate};

#[cfg(test)]
mod tests;
