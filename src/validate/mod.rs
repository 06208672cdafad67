//! Record validation
//!
//! `validate(raw, schema)` turns one raw record into exactly one
//! [`Verdict`]. Every declared field is normalized and checked; failures
//! accumulate instead of short-circuiting, so a record with three bad
//! fields reports all three. Cross-field checks only run once every
//! single-field check passed. Normalization failures and rule violations
//! never escape as errors: they become the violation list of a
//! [`RejectedRecord`].

mod references;
mod types;
mod validator;

pub use references::ReferenceIndex;
pub use types::{
    CanonicalRecord, RawRecord, ReasonCode, RejectedRecord, Verdict, Violation,
};
pub use validator::{validate, weight_class, Validator};
