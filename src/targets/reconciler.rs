use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::crl::{CrlEvent, CrlSnapshot, RevocationReason, SerialNumber};

use super::types::TargetRecord;

/// A target found on the CRL for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewlyFlaggedTarget {
    pub serial_number: SerialNumber,
    pub revocation_time: DateTime<Utc>,
    pub reason: Option<RevocationReason>,
}

/// Updated targets plus the ones that flipped to revoked.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub targets: Vec<TargetRecord>,
    pub flagged: Vec<NewlyFlaggedTarget>,
}

impl Reconciliation {
    /// Whether any target changed and the registry needs saving.
    pub fn changed(&self) -> bool {
        !self.flagged.is_empty()
    }

    pub fn events(&self) -> Vec<CrlEvent> {
        self.flagged
            .iter()
            .map(|flagged| CrlEvent::NewlyFlaggedTarget {
                serial_number: flagged.serial_number.clone(),
                revocation_time: flagged.revocation_time,
                reason: flagged.reason,
            })
            .collect()
    }
}

/// Flag every target listed on `current`.
///
/// Flags are never cleared: a target that is already revoked stays revoked
/// whether or not the CRL still lists it.
pub fn reconcile(current: &CrlSnapshot, targets: &[TargetRecord]) -> Reconciliation {
    reconcile_scoped(current, targets, |_| true)
}

/// Like [`reconcile`], but only targets selected by `in_scope` are checked.
/// The others are returned unchanged.
pub fn reconcile_scoped<P>(
    current: &CrlSnapshot,
    targets: &[TargetRecord],
    in_scope: P,
) -> Reconciliation
where
    P: Fn(&TargetRecord) -> bool,
{
    let mut flagged = Vec::new();

    let targets = targets
        .iter()
        .map(|target| {
            let mut target = target.clone();
            if !target.revoked
                && in_scope(&target)
                && let Some(entry) = current.get(&target.serial_number)
            {
                target.revoked = true;
                flagged.push(NewlyFlaggedTarget {
                    serial_number: entry.serial_number.clone(),
                    revocation_time: entry.revocation_time,
                    reason: entry.reason,
                });
            }
            target
        })
        .collect();

    Reconciliation { targets, flagged }
}
