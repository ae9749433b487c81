// Errors at the row source boundary

use thiserror::Error;

/// Failures at the row source boundary
#[derive(Error, Debug)]
pub enum RowSourceError {
    #[error("failed to read rows from {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {message}")]
    Http { url: String, message: String },

    #[error("invalid JSON from {location}: {source}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid CSV from {location}: {source}")]
    Csv {
        location: String,
        #[source]
        source: csv::Error,
    },

    #[error("rows from {0} must be a JSON array of objects")]
    Shape(String),

    #[error("no row source can load {0}")]
    Unsupported(String),
}
