use thiserror::Error;

/// Errors raised while turning fetched bytes into a snapshot.
///
/// Both variants are fatal for the fetch cycle that produced the bytes: the
/// snapshot store is left untouched and the driver retries on its next cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrlError {
    #[error("Malformed CRL input: {0}")]
    MalformedInput(String),

    #[error("CRL is missing required field `{0}`")]
    MissingRequiredField(&'static str),
}

/// Convenient Result type alias
pub type CrlResult<T> = Result<T, CrlError>;
