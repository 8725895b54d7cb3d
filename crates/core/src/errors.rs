use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::item::ItemId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("self edge `{item}` -> `{item}` found in source `{source_name}`")]
    SelfEdge { source_name: String, item: ItemId },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Structural problems in input tables. Always fatal.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("table `{table}` is missing required column `{column}`")]
    MissingColumn { table: String, column: String },
    #[error("table `{table}` has duplicate key `{key}` where keys must be unique")]
    DuplicateKey { table: String, key: String },
    #[error("table `{table}` row {row}: invalid `{column}` value `{value}`")]
    InvalidValue { table: String, row: usize, column: String, value: String },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("similarity collaborator failed: {0}")]
    Collaborator(String),
}

impl PipelineError {
    /// Stable machine-readable class used in command outcomes.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_validation",
            Self::Data(_) => "data_validation",
            Self::Domain(_) => "invariant_violation",
            Self::Collaborator(_) => "collaborator",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Data(_) => 3,
            Self::Domain(_) | Self::Collaborator(_) => 1,
        }
    }
}
