//! Common types used throughout retail-etl
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Entity Kind
// ============================================================================

/// One of the fixed record categories flowing through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Customer profiles
    User,
    /// Store metadata
    Store,
    /// Product catalog
    Product,
    /// Card / payment details
    Card,
    /// Calendar dimension of order timestamps
    DateTime,
    /// Order facts
    Order,
}

impl EntityKind {
    /// Every entity kind, in declaration order
    pub const ALL: [EntityKind; 6] = [
        EntityKind::User,
        EntityKind::Store,
        EntityKind::Product,
        EntityKind::Card,
        EntityKind::DateTime,
        EntityKind::Order,
    ];

    /// Stable identifier used in config files and logs
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Store => "store",
            EntityKind::Product => "product",
            EntityKind::Card => "card",
            EntityKind::DateTime => "date_time",
            EntityKind::Order => "order",
        }
    }

    /// Default warehouse table
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::User => "dim_users",
            EntityKind::Store => "dim_store_details",
            EntityKind::Product => "dim_products",
            EntityKind::Card => "dim_card_details",
            EntityKind::DateTime => "dim_date_times",
            EntityKind::Order => "orders_table",
        }
    }

    /// Parse a comma-separated entity list (`user,store,order`)
    pub fn parse_list(list: &str) -> Result<Vec<EntityKind>> {
        let mut kinds = Vec::new();
        for part in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let kind: EntityKind = part.parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" | "users" => Ok(EntityKind::User),
            "store" | "stores" | "store_details" => Ok(EntityKind::Store),
            "product" | "products" => Ok(EntityKind::Product),
            "card" | "cards" | "card_details" | "payment" => Ok(EntityKind::Card),
            "date_time" | "date_times" | "datetime" => Ok(EntityKind::DateTime),
            "order" | "orders" => Ok(EntityKind::Order),
            other => Err(Error::invalid_value(
                "entity",
                format!("unknown entity kind '{other}'"),
            )),
        }
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Case Policy
// ============================================================================

/// Case normalization applied to text and code fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePolicy {
    /// Leave case untouched
    #[default]
    Preserve,
    /// Upper-case every character
    Upper,
    /// Lower-case every character
    Lower,
    /// Upper-case the first letter of every word
    Title,
}

impl CasePolicy {
    /// Apply the policy to a string
    pub fn apply(self, value: &str) -> String {
        match self {
            CasePolicy::Preserve => value.to_string(),
            CasePolicy::Upper => value.to_uppercase(),
            CasePolicy::Lower => value.to_lowercase(),
            CasePolicy::Title => title_case(value),
        }
    }
}

/// Title-case a string: a letter following a non-letter is upper-cased,
/// every other letter is lower-cased
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_is_letter = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_serde() {
        let kind: EntityKind = serde_json::from_str("\"date_time\"").unwrap();
        assert_eq!(kind, EntityKind::DateTime);

        let json = serde_json::to_string(&EntityKind::Card).unwrap();
        assert_eq!(json, "\"card\"");
    }

    #[test]
    fn test_entity_kind_from_str_aliases() {
        assert_eq!("Users".parse::<EntityKind>().unwrap(), EntityKind::User);
        assert_eq!(
            "card_details".parse::<EntityKind>().unwrap(),
            EntityKind::Card
        );
        assert_eq!("orders".parse::<EntityKind>().unwrap(), EntityKind::Order);
        assert!("customers".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_parse_list_dedups() {
        let kinds = EntityKind::parse_list("user, store,user,,order").unwrap();
        assert_eq!(
            kinds,
            vec![EntityKind::User, EntityKind::Store, EntityKind::Order]
        );
    }

    #[test]
    fn test_table_names() {
        assert_eq!(EntityKind::User.table_name(), "dim_users");
        assert_eq!(EntityKind::Order.table_name(), "orders_table");
    }

    #[test]
    fn test_case_policy() {
        assert_eq!(CasePolicy::Upper.apply("gb"), "GB");
        assert_eq!(CasePolicy::Lower.apply("GB"), "gb");
        assert_eq!(CasePolicy::Preserve.apply("Gb"), "Gb");
        assert_eq!(CasePolicy::Title.apply("high STREET, o'neil"), "High Street, O'Neil");
    }
}
