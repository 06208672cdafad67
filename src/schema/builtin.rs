//! Built-in entity schemas embedded in the binary

use crate::types::EntityKind;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Built-in schema YAML declarations
pub static BUILTIN_SCHEMAS: LazyLock<BTreeMap<EntityKind, &'static str>> = LazyLock::new(|| {
    let mut m = BTreeMap::new();

    // Dimensions
    m.insert(EntityKind::User, include_str!("../../schemas/users.yaml"));
    m.insert(EntityKind::Store, include_str!("../../schemas/stores.yaml"));
    m.insert(EntityKind::Product, include_str!("../../schemas/products.yaml"));
    m.insert(EntityKind::Card, include_str!("../../schemas/cards.yaml"));
    m.insert(
        EntityKind::DateTime,
        include_str!("../../schemas/date_times.yaml"),
    );

    // Facts
    m.insert(EntityKind::Order, include_str!("../../schemas/orders.yaml"));

    m
});

/// Get the built-in declaration for an entity kind
pub fn get_builtin(kind: EntityKind) -> Option<&'static str> {
    BUILTIN_SCHEMAS.get(&kind).copied()
}
