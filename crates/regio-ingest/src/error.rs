#![deny(unsafe_code)]

use std::path::PathBuf;

use regio_model::HarmonizeError;

/// Failures reading run inputs from disk.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{path}: missing column `{column}` (found: {found})")]
    MissingColumn {
        path: PathBuf,
        column: String,
        found: String,
    },

    #[error("{path}: row {row}, column `{column}`: {message}")]
    InvalidValue {
        path: PathBuf,
        row: usize,
        column: String,
        message: String,
    },

    #[error("{path}: {source}")]
    Harmonize {
        path: PathBuf,
        #[source]
        source: HarmonizeError,
    },
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(
        path: impl Into<PathBuf>,
        row: usize,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            path: path.into(),
            row,
            column: column.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
