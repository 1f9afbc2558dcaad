use serde::Serialize;
use tracing::debug;

use super::events::CrlEvent;
use super::types::{CrlNumber, CrlSnapshot, RevocationReason, RevokedEntry, SerialNumber};

/// An entry listed in both snapshots whose revocation reason differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonChange {
    pub serial_number: SerialNumber,
    pub old_reason: Option<RevocationReason>,
    pub new_reason: Option<RevocationReason>,
    /// The entry as listed in the newer snapshot.
    pub entry: RevokedEntry,
}

/// Difference between two snapshots of the same distribution point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// No previous snapshot was available, every entry counts as new.
    pub bootstrap: bool,
    pub from_crl_number: Option<CrlNumber>,
    pub to_crl_number: Option<CrlNumber>,
    pub newly_revoked: Vec<RevokedEntry>,
    pub reason_changed: Vec<ReasonChange>,
    /// Entries no longer published. The certificates stay revoked.
    pub removed_from_crl: Vec<RevokedEntry>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.newly_revoked.is_empty()
            && self.reason_changed.is_empty()
            && self.removed_from_crl.is_empty()
    }

    pub fn newly_revoked_serials(&self) -> impl Iterator<Item = &SerialNumber> {
        self.newly_revoked.iter().map(|entry| &entry.serial_number)
    }

    pub fn events(&self) -> Vec<CrlEvent> {
        let mut events = Vec::new();
        if !self.newly_revoked.is_empty() {
            events.push(CrlEvent::NewlyRevoked {
                bootstrap: self.bootstrap,
                entries: self.newly_revoked.clone(),
            });
        }
        if !self.reason_changed.is_empty() {
            events.push(CrlEvent::ReasonChanged {
                entries: self.reason_changed.clone(),
            });
        }
        if !self.removed_from_crl.is_empty() {
            events.push(CrlEvent::RemovedFromCrl {
                entries: self.removed_from_crl.clone(),
            });
        }
        events
    }
}

/// Compare `new` against `old` by serial number.
///
/// Without `old` the whole of `new` is reported as newly revoked and the
/// result is marked as a bootstrap diff. Snapshots carrying the same CRL
/// number are the same issuance and always produce an empty diff. Neither
/// input is modified.
pub fn diff(old: Option<&CrlSnapshot>, new: &CrlSnapshot) -> DiffResult {
    let to_crl_number = new.crl_number().cloned();

    let Some(old) = old else {
        return DiffResult {
            bootstrap: true,
            from_crl_number: None,
            to_crl_number,
            newly_revoked: new.entries().cloned().collect(),
            ..Default::default()
        };
    };

    let from_crl_number = old.crl_number().cloned();

    if from_crl_number.is_some() && from_crl_number == to_crl_number {
        return DiffResult {
            from_crl_number,
            to_crl_number,
            ..Default::default()
        };
    }

    if let (Some(from), Some(to)) = (&from_crl_number, &to_crl_number)
        && from > to
    {
        debug!(%from, %to, "Diffing towards an older CRL number");
    }

    let mut newly_revoked = Vec::new();
    let mut reason_changed = Vec::new();

    for entry in new.entries() {
        match old.get(&entry.serial_number) {
            None => newly_revoked.push(entry.clone()),
            Some(previous) if previous.reason != entry.reason => {
                reason_changed.push(ReasonChange {
                    serial_number: entry.serial_number.clone(),
                    old_reason: previous.reason,
                    new_reason: entry.reason,
                    entry: entry.clone(),
                })
            }
            Some(_) => {}
        }
    }

    let removed_from_crl = old
        .entries()
        .filter(|entry| !new.contains(&entry.serial_number))
        .cloned()
        .collect();

    DiffResult {
        bootstrap: false,
        from_crl_number,
        to_crl_number,
        newly_revoked,
        reason_changed,
        removed_from_crl,
    }
}
