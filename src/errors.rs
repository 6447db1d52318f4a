/// Domain-specific error types for placerecon
///
/// Only configuration and file errors are fatal. Per-item knowledge-base
/// failures use `KbError` and are absorbed by the reconciliation cascade.

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read '{path}': {message}")]
    Io {
        path: String,
        message: String,
    },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Invalid column specification: {0}")]
    InvalidColumns(String),
}

impl From<csv::Error> for ReconError {
    fn from(e: csv::Error) -> Self {
        ReconError::Csv(e.to_string())
    }
}

impl ReconError {
    /// Helper to attach the offending path to an IO failure
    ///
    /// Example:
    /// ```
    /// use placerecon::errors::ReconError;
    /// let err = ReconError::io("regions.csv", "No such file or directory");
    /// assert!(err.to_string().contains("regions.csv"));
    /// ```
    pub fn io(path: impl AsRef<Path>, message: impl ToString) -> Self {
        ReconError::Io {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }
}

/// Errors raised by a knowledge-base query.
///
/// These never abort a run: the reconciliation cascade treats any of them
/// as "no candidates" for the stage that hit it.
#[derive(Debug, thiserror::Error)]
pub enum KbError {
    /// Connection failure, timeout, or an unreadable body
    #[error("Query transport error: {0}")]
    Transport(String),

    /// Query service returned an HTTP error
    #[error("Query service error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response was not a SPARQL JSON result set
    #[error("Malformed query response: {0}")]
    Decode(String),

    /// A value could not be embedded in a query (e.g., not a valid IRI)
    #[error("Invalid query term: {0}")]
    InvalidTerm(String),

    /// Client could not be built from configuration
    #[error("Query service not configured: {0}")]
    NotConfigured(String),
}
