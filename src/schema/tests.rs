//! Tests for schema module

use super::*;
use crate::error::Error;
use crate::normalize::FieldType;
use crate::types::{CasePolicy, EntityKind};
use pretty_assertions::assert_eq;

fn parse(yaml: &str) -> SchemaDefinition {
    SchemaDefinition::from_yaml(yaml).unwrap()
}

const ITEM: &str = r"
entity: product
key: [code]
fields:
  - name: code
    type: text
  - name: price
    type: money
    checks:
      - range: { min: 0 }
";

const LINE: &str = r"
entity: order
key: [code]
fields:
  - name: code
    type: reference
    entity: product
  - name: quantity
    type: integer
";

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn test_parse_field_types() {
    let def = parse(
        r#"
entity: user
key: [id]
fields:
  - name: id
    type: uuid
    checks:
      - uuid_version: 4
  - name: country_code
    type: code
    case: upper
    allowed: [GB, DE]
    aliases: { GGB: GB }
  - name: joined
    type: date
    nullable: true
    checks:
      - date_range: { min: "1990-01-01", max: today }
"#,
    );

    assert_eq!(def.fields.len(), 3);
    assert_eq!(def.fields[0].field_type, FieldType::Uuid);
    match &def.fields[1].field_type {
        FieldType::Code {
            case,
            allowed,
            aliases,
        } => {
            assert_eq!(*case, CasePolicy::Upper);
            assert_eq!(allowed, &vec!["GB".to_string(), "DE".to_string()]);
            assert_eq!(aliases.get("GGB").map(String::as_str), Some("GB"));
        }
        other => panic!("unexpected type {other:?}"),
    }
    assert!(def.fields[2].nullable);
    assert!(matches!(
        def.fields[2].checks[0],
        CheckDefinition::DateRange { .. }
    ));
}

#[test]
fn test_unknown_type_is_malformed() {
    let result = SchemaDefinition::from_yaml(
        r"
entity: user
key: [id]
fields:
  - name: id
    type: colour
",
    );
    assert!(result.is_err());
}

#[test]
fn test_builtin_schemas_parse() {
    for (kind, yaml) in BUILTIN_SCHEMAS.iter() {
        let def = SchemaDefinition::from_yaml(yaml).unwrap();
        assert_eq!(def.entity, *kind);
    }

    let stores = SchemaDefinition::from_yaml(BUILTIN_SCHEMAS[&EntityKind::Store]).unwrap();
    assert!(matches!(
        stores.cross_checks[0],
        CrossCheckDefinition::RequiredUnless { .. }
    ));
}

#[test]
fn test_checks_as_single_key_maps() {
    let def = parse(
        r"
entity: date_time
key: [id]
fields:
  - name: id
    type: text
    checks:
      - pattern: '^[a-f0-9-]+$'
      - length: { min: 36, max: 36 }
  - name: month
    type: integer
    checks:
      - range: { min: 1, max: 12 }
cross_checks:
  - calendar_date: { year: year, month: month, day: day }
  - not_before:
      earlier: born
      later: joined
",
    );

    assert!(matches!(
        &def.fields[0].checks[0],
        CheckDefinition::Pattern(p) if p == "^[a-f0-9-]+$"
    ));
    assert!(matches!(
        def.fields[0].checks[1],
        CheckDefinition::Length { min: Some(36), max: Some(36) }
    ));
    assert!(matches!(
        def.fields[1].checks[0],
        CheckDefinition::Range { min: Some(_), max: Some(_) }
    ));
    assert_eq!(def.cross_checks.len(), 2);
    assert!(matches!(
        def.cross_checks[0],
        CrossCheckDefinition::CalendarDate { .. }
    ));
    assert!(matches!(
        def.cross_checks[1],
        CrossCheckDefinition::NotBefore { .. }
    ));
}

// ============================================================================
// Compilation
// ============================================================================

#[test]
fn test_builtin_registry_dependency_order() {
    let registry = SchemaRegistry::builtin().unwrap();
    let order = registry.dependency_order();

    assert_eq!(order.len(), 6);
    assert_eq!(order.last(), Some(&EntityKind::Order));
    assert_eq!(
        registry.dependencies_of(EntityKind::Order),
        &[
            EntityKind::DateTime,
            EntityKind::User,
            EntityKind::Card,
            EntityKind::Store,
            EntityKind::Product
        ]
    );
    assert!(registry.dependencies_of(EntityKind::User).is_empty());
    assert!(registry.is_referenced(EntityKind::Store));
    assert!(!registry.is_referenced(EntityKind::Order));
}

#[test]
fn test_reference_resolves_key_type() {
    let registry = SchemaRegistry::builtin().unwrap();
    let order = registry.get(EntityKind::Order).unwrap();

    let user_uuid = order.field("user_uuid").unwrap();
    assert_eq!(user_uuid.reference(), Some(EntityKind::User));
    match &user_uuid.field_type {
        FieldType::Reference { key: Some(key), .. } => assert_eq!(**key, FieldType::Uuid),
        other => panic!("unresolved reference {other:?}"),
    }
    assert_eq!(user_uuid.field_type.sql_type(), "UUID");
}

#[test]
fn test_sources_default_to_name() {
    let registry = SchemaRegistry::builtin().unwrap();
    let store = registry.get(EntityKind::Store).unwrap();

    assert_eq!(store.field("store_code").unwrap().sources, vec!["store_code"]);
    assert_eq!(
        store.field("latitude").unwrap().sources,
        vec!["latitude", "lat"]
    );
}

#[test]
fn test_columns_include_derived() {
    let registry = SchemaRegistry::builtin().unwrap();
    let product = registry.get(EntityKind::Product).unwrap();
    let columns = product.columns();

    assert_eq!(
        columns.last(),
        Some(&("weight_class".to_string(), "VARCHAR"))
    );
    assert!(columns.contains(&("product_price".to_string(), "DECIMAL(12,2)")));
}

#[test]
fn test_undeclared_key_is_error() {
    let def = parse(
        r"
entity: product
key: [sku]
fields:
  - name: code
    type: text
",
    );
    let err = SchemaRegistry::from_definitions(vec![def]).unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
    assert!(err.to_string().contains("sku"));
}

#[test]
fn test_range_on_text_is_error() {
    let def = parse(
        r"
entity: product
key: [code]
fields:
  - name: code
    type: text
    checks:
      - range: { min: 0 }
",
    );
    assert!(SchemaRegistry::from_definitions(vec![def]).is_err());
}

#[test]
fn test_invalid_pattern_is_error() {
    let def = parse(
        r#"
entity: product
key: [code]
fields:
  - name: code
    type: text
    checks:
      - pattern: "([a-z"
"#,
    );
    let err = SchemaRegistry::from_definitions(vec![def]).unwrap_err();
    assert!(err.to_string().contains("invalid pattern"));
}

#[test]
fn test_unknown_reference_target_is_error() {
    let err = SchemaRegistry::from_definitions(vec![parse(LINE)]).unwrap_err();
    assert!(err.to_string().contains("unknown entity"));
}

#[test]
fn test_cross_check_unknown_field_is_error() {
    let def = parse(
        r"
entity: card
key: [number]
fields:
  - name: number
    type: card_number
cross_checks:
  - not_before: { earlier: issued, later: number }
",
    );
    let err = SchemaRegistry::from_definitions(vec![def]).unwrap_err();
    assert!(err.to_string().contains("issued"));
}

#[test]
fn test_duplicate_entity_is_error() {
    let err = SchemaRegistry::from_definitions(vec![parse(ITEM), parse(ITEM)]).unwrap_err();
    assert!(err.to_string().contains("more than once"));
}

#[test]
fn test_reference_cycle_is_error() {
    let a = parse(
        r"
entity: user
key: [id]
fields:
  - name: id
    type: text
  - name: store
    type: reference
    entity: store
",
    );
    let b = parse(
        r"
entity: store
key: [id]
fields:
  - name: id
    type: text
  - name: owner
    type: reference
    entity: user
",
    );
    let err = SchemaRegistry::from_definitions(vec![a, b]).unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn test_small_registry_order() {
    let registry = SchemaRegistry::from_definitions(vec![parse(LINE), parse(ITEM)]).unwrap();
    assert_eq!(
        registry.dependency_order(),
        &[EntityKind::Product, EntityKind::Order]
    );
    assert!(registry.get(EntityKind::User).is_none());
    assert!(registry.require(EntityKind::User).is_err());
}

#[test]
fn test_load_overrides_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("products.yaml"),
        r"
entity: product
table: products_v2
key: [product_code]
fields:
  - name: product_code
    type: text
",
    )
    .unwrap();

    let registry = SchemaRegistry::load(Some(dir.path())).unwrap();
    let product = registry.get(EntityKind::Product).unwrap();
    assert_eq!(product.table, "products_v2");
    assert_eq!(product.fields.len(), 1);
    assert_eq!(registry.dependency_order().len(), 6);
}

#[test]
fn test_display_lists_fields() {
    let registry = SchemaRegistry::builtin().unwrap();
    let text = registry.get(EntityKind::Order).unwrap().to_string();
    assert!(text.starts_with("order -> orders_table"));
    assert!(text.contains("-> user"));
}
