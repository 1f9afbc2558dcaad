//! Certificate Revocation List (CRL) snapshot engine
//!
//! # Features
//! - Parsing DER or PEM encoded CRLs into immutable snapshots
//! - Ordering issuances by CRL number, falling back to thisUpdate
//! - Set difference between consecutive snapshots
//! - Archiving the raw bytes of every accepted issuance

pub mod archive;
mod diff;
mod errors;
mod events;
mod parser;
mod store;
mod types;

// Re-export public types
pub use archive::{FileArchive, MemoryArchive, SnapshotArchive};
pub use diff::{DiffResult, ReasonChange, diff};
pub use errors::{CrlError, CrlResult};
pub use events::CrlEvent;
pub use parser::{MIN_CRL_LEN, ParsedCrl, parse};
pub use store::{AcceptDecision, Evaluation, SnapshotStore, StaleReason, StoreError};
pub use types::{
    CrlNumber, CrlSnapshot, DuplicateSerial, ParseSerialError, RevocationReason, RevokedEntry,
    SerialNumber, SnapshotBuilder, SnapshotId,
};
