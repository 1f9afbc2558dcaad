use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::diff::ReasonChange;
use super::store::StaleReason;
use super::types::{CrlNumber, DuplicateSerial, RevocationReason, RevokedEntry, SerialNumber};

/// Structured events produced by the engine for the driver to log, alert on
/// or persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrlEvent {
    SnapshotAccepted {
        crl_number: Option<CrlNumber>,
        issued_at: DateTime<Utc>,
        revoked_count: usize,
        degraded: bool,
    },
    SnapshotUnchanged {
        crl_number: Option<CrlNumber>,
        issued_at: DateTime<Utc>,
    },
    SnapshotStale {
        reason: StaleReason,
    },
    /// The CRL number is missing and ordering fell back to thisUpdate.
    DegradedOrderingMode {
        issued_at: DateTime<Utc>,
    },
    DuplicateSerialNumber {
        serial_number: SerialNumber,
        kept_revocation_time: DateTime<Utc>,
        discarded_revocation_time: DateTime<Utc>,
    },
    NewlyRevoked {
        bootstrap: bool,
        entries: Vec<RevokedEntry>,
    },
    ReasonChanged {
        entries: Vec<ReasonChange>,
    },
    /// Entries no longer republished. This never means the certificate is valid again.
    RemovedFromCrl {
        entries: Vec<RevokedEntry>,
    },
    NewlyFlaggedTarget {
        serial_number: SerialNumber,
        revocation_time: DateTime<Utc>,
        reason: Option<RevocationReason>,
    },
    CrlExpired {
        crl_number: Option<CrlNumber>,
        next_update_at: DateTime<Utc>,
    },
}

impl CrlEvent {
    /// Whether the event signals something the operator should look at.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            CrlEvent::SnapshotStale { .. }
                | CrlEvent::DegradedOrderingMode { .. }
                | CrlEvent::DuplicateSerialNumber { .. }
                | CrlEvent::NewlyFlaggedTarget { .. }
                | CrlEvent::CrlExpired { .. }
        )
    }

    /// Emit the event through `tracing` with structured fields.
    pub fn log(&self, distribution_point: &str) {
        match self {
            CrlEvent::SnapshotAccepted {
                crl_number,
                issued_at,
                revoked_count,
                degraded,
            } => info!(
                distribution_point,
                crl_number = %display_number(crl_number),
                %issued_at,
                revoked_count,
                degraded,
                "New CRL accepted"
            ),
            CrlEvent::SnapshotUnchanged {
                crl_number,
                issued_at,
            } => debug!(
                distribution_point,
                crl_number = %display_number(crl_number),
                %issued_at,
                "CRL unchanged"
            ),
            CrlEvent::SnapshotStale { reason } => warn!(
                distribution_point,
                reason = ?reason,
                "Fetched CRL is older than the current one"
            ),
            CrlEvent::DegradedOrderingMode { issued_at } => warn!(
                distribution_point,
                %issued_at,
                "CRL has no CRL number, ordering by thisUpdate"
            ),
            CrlEvent::DuplicateSerialNumber {
                serial_number,
                kept_revocation_time,
                discarded_revocation_time,
            } => warn!(
                distribution_point,
                %serial_number,
                %kept_revocation_time,
                %discarded_revocation_time,
                "Duplicate serial number in CRL"
            ),
            CrlEvent::NewlyRevoked { bootstrap, entries } => {
                info!(
                    distribution_point,
                    bootstrap,
                    count = entries.len(),
                    "Newly revoked certificates"
                );
                // Bootstrap diffs list the whole CRL; keep per-entry lines for real deltas.
                if !bootstrap {
                    for entry in entries {
                        info!(
                            distribution_point,
                            serial_number = %entry.serial_number,
                            revocation_time = %entry.revocation_time,
                            reason = ?entry.reason,
                            "Newly revoked"
                        );
                    }
                }
            }
            CrlEvent::ReasonChanged { entries } => {
                for change in entries {
                    info!(
                        distribution_point,
                        serial_number = %change.serial_number,
                        old_reason = ?change.old_reason,
                        new_reason = ?change.new_reason,
                        "Revocation reason changed"
                    );
                }
            }
            CrlEvent::RemovedFromCrl { entries } => {
                for entry in entries {
                    info!(
                        distribution_point,
                        serial_number = %entry.serial_number,
                        reason = ?entry.reason,
                        "Entry removed from CRL"
                    );
                }
            }
            CrlEvent::NewlyFlaggedTarget {
                serial_number,
                revocation_time,
                reason,
            } => warn!(
                distribution_point,
                %serial_number,
                %revocation_time,
                reason = ?reason,
                "Target certificate revoked"
            ),
            CrlEvent::CrlExpired {
                crl_number,
                next_update_at,
            } => warn!(
                distribution_point,
                crl_number = %display_number(crl_number),
                %next_update_at,
                "CRL is past its nextUpdate"
            ),
        }
    }
}

impl From<&DuplicateSerial> for CrlEvent {
    fn from(duplicate: &DuplicateSerial) -> Self {
        CrlEvent::DuplicateSerialNumber {
            serial_number: duplicate.serial_number.clone(),
            kept_revocation_time: duplicate.kept.revocation_time,
            discarded_revocation_time: duplicate.discarded.revocation_time,
        }
    }
}

fn display_number(number: &Option<CrlNumber>) -> String {
    number
        .as_ref()
        .map_or_else(|| "none".to_string(), ToString::to_string)
}
