use thiserror::Error;

/// Programmer or configuration errors. Per-record data problems are never
/// reported through this type; they degrade to "field unset" instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
