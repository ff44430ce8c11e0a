use std::io;

use thiserror::Error;

/// Failures that abort a pipeline run before any result is stored.
///
/// Cell-level numeric coercion failures and empty inputs are not errors:
/// both are recovered in place (zero substitution, empty report) and only
/// counted in the run diagnostics.
#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("input could not be parsed as {format}: {detail}")]
    Format { format: &'static str, detail: String },
    #[error("required column '{0}' is missing from the input")]
    MissingColumn(String),
    #[error("two column names normalize to '{0}'")]
    HeaderCollision(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<csv::Error> for ZoneError {
    fn from(e: csv::Error) -> Self {
        let detail = e.to_string();
        match e.into_kind() {
            csv::ErrorKind::Io(io) => ZoneError::Io(io),
            _ => ZoneError::Format {
                format: "delimited text",
                detail,
            },
        }
    }
}

impl From<serde_json::Error> for ZoneError {
    fn from(e: serde_json::Error) -> Self {
        ZoneError::Format {
            format: "json",
            detail: e.to_string(),
        }
    }
}
