//! Document decoder module
//!
//! Supports: CSV, JSON, JSON Lines, column-oriented JSON
//!
//! # Overview
//!
//! Decoders turn a source document into untyped records. They never coerce
//! values: CSV cells stay strings (empty cells become null) so the
//! normalizer is the only place a raw value gets a type.

mod decoders;
mod types;

pub use decoders::{decoder_for, CsvDecoder, JsonColumnsDecoder, JsonDecoder, JsonlDecoder};
pub use types::{DecoderConfig, DecoderFormat, RecordDecoder};
