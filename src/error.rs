// src/error.rs

use thiserror::Error;

/// Fatal failures of a load cycle.
///
/// Cell-level coercion failures never show up here; they become `None`
/// in the resulting tables.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The request could not complete, or came back with a non-success status.
    #[error("GET {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The resource arrived but does not have the expected shape.
    #[error("unexpected structure in {url}: {reason}")]
    Parse { url: String, reason: String },

    /// The delimited location resource could not be read.
    #[error("malformed CSV in {url}: {source}")]
    Csv {
        url: String,
        #[source]
        source: csv::Error,
    },

    /// Strict mode only: the aggregate row was expected but absent.
    #[error("row {label:?} not found in {url}")]
    MissingRow { url: String, label: String },
}

impl LoadError {
    pub(crate) fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        LoadError::Network {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = LoadError> = std::result::Result<T, E>;
