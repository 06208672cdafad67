//! Warehouse loading
//!
//! A [`Loader`] commits bounded batches of canonical records for one entity
//! kind, each batch in its own transaction, and reports failures as
//! [`LoadError::ConstraintViolation`] or [`LoadError::ConnectionLost`].
//! Tables are created from the entity schema on first use, keyed on the
//! schema's upsert key.

mod discard;
mod duckdb_store;
mod types;

pub use discard::DiscardLoader;
pub use duckdb_store::DuckDbWarehouse;
pub use types::{LoadError, LoadTarget, Loader, WarehouseConfig};

#[cfg(test)]
mod tests;
