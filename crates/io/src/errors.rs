use std::path::PathBuf;

use cobuy_core::errors::DataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableIoError {
    #[error("could not open table `{path}`: {source}")]
    Open { path: PathBuf, source: csv::Error },
    #[error("could not read table `{table}`: {source}")]
    Read { table: String, source: csv::Error },
    #[error("could not encode table `{path}`: {source}")]
    Encode { path: PathBuf, source: csv::Error },
    #[error("could not write `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    Data(#[from] DataError),
}

impl TableIoError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Data(_) => "data_validation",
            Self::Open { .. } | Self::Read { .. } | Self::Encode { .. } | Self::Write { .. } => {
                "io"
            }
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Data(_) => 3,
            _ => 4,
        }
    }
}
