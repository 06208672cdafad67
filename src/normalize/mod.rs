//! Field normalization
//!
//! The single conversion boundary between untyped raw values and typed
//! canonical values. Every rule is a pure function of `(raw value, field
//! type)` and is idempotent: feeding a normalized value back through the
//! same rule (via [`FieldValue::to_raw`]) returns it unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_etl::normalize::{normalize, FieldType, FieldValue};
//!
//! let value = normalize(&json!("£19.99"), &FieldType::Money)?;
//! assert_eq!(value.to_raw(), json!("19.99"));
//! ```

mod rules;
mod types;

pub use rules::{is_null_token, normalize};
pub use types::{default_date_formats, FieldType, FieldValue, NormalizeError};

#[cfg(test)]
mod tests;
