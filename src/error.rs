// Error types for loading, configuring and exporting
//
// Library code returns DataError so callers can tell "not loaded yet" from
// "load failed". The binary wraps these in anyhow with extra context.

use crate::loader::Table;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    /// A table could not be fetched from its source
    #[error("failed to read {table} table from {location}")]
    Io {
        table: Table,
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// The fetched bytes are not valid `;`-delimited CSV
    #[error("failed to parse {table} table")]
    Parse {
        table: Table,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read config file {path}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to export report")]
    Export(#[source] csv::Error),

    /// Data was requested before any successful load
    #[error("dataset has not been loaded")]
    NotLoaded,
}

pub type DataResult<T> = std::result::Result<T, DataError>;
