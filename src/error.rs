//! Error types for aggregation operations

use thiserror::Error;

/// Errors raised while deriving views from student records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    /// A caller-supplied parameter is out of contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A record holds a missing, non-numeric or out-of-set value.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// A specialized Result type for aggregation operations
pub type Result<T> = std::result::Result<T, AggregateError>;
