//! Shared identifiers and error categories.

pub mod error;
pub mod types;

pub use error::ErrorKind;
pub use types::AggregateId;
