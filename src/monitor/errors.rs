use thiserror::Error;

use crate::crl::{CrlError, StoreError};
use crate::error::BackendError;

/// Distribution point download errors
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid distribution point URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error {status}: failed to fetch CRL from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Timeout while fetching CRL")]
    Timeout,

    #[error("Distribution point returned an empty body")]
    Empty,
}

/// Errors that abort a single monitoring cycle
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("CRL download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("CRL parsing failed: {0}")]
    Crl(#[from] CrlError),

    #[error("Snapshot store error: {0}")]
    Store(#[from] StoreError),

    #[error("Target registry error: {0}")]
    Registry(#[source] BackendError),

    #[error("Unknown distribution point: {0}")]
    UnknownDistributionPoint(String),
}

/// Convenient Result type alias
pub type MonitorResult<T> = Result<T, MonitorError>;
