// crates/ordermart-core/src/error.rs

use std::path::PathBuf;

use ordermart_bucket::BucketError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("File {object} not found in bucket {bucket}.")]
    MissingInput { object: String, bucket: String },

    #[error("failed to parse {object}: {message}")]
    Parse { object: String, message: String },

    #[error("table {table} has no column {column}")]
    MissingColumn { table: &'static str, column: String },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("object storage error: {0}")]
    Bucket(#[from] BucketError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("warehouse load of {table} failed: {source}")]
    Warehouse {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV writing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("upload failed: {0}")]
    Upload(#[source] BucketError),

    #[error("failed to render table values: {0}")]
    Render(#[from] polars::error::PolarsError),
}

/// Raised while tearing down a scratch directory. Only ever logged.
#[derive(Error, Debug)]
#[error("failed to remove {}: {source}", .path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

pub type Result<T> = std::result::Result<T, EtlError>;
