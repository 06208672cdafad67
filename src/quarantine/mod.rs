//! Quarantine of rejected records
//!
//! Rejected records are persisted verbatim with their ordered violation
//! list, one log per entity kind and run. Each pipeline gets its own logger
//! handle; there is no process-wide quarantine state.

mod jsonl;
mod memory;
mod types;

pub use jsonl::{read_entries, JsonlQuarantine};
pub use memory::MemoryQuarantine;
pub use types::{QuarantineConfig, QuarantineEntry, QuarantineLogger, QuarantineStore};

#[cfg(test)]
mod tests;
