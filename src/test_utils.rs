use chrono::{DateTime, Utc};

use crate::crl::{CrlSnapshot, RevocationReason, RevokedEntry, SerialNumber};

#[path = "../tests/common/crl_der.rs"]
mod crl_der;

pub(crate) use crl_der::{CrlBuilder, at};

/// A 20-octet serial, the RFC 5280 maximum.
pub(crate) fn big_serial() -> SerialNumber {
    SerialNumber::from_hex("7f3a9c0e55d2b61849aa03e7c1d4f5b6a7988776").unwrap()
}

/// In-memory snapshot with the given serials, all revoked at `issued_at`.
pub(crate) fn snapshot(crl_number: Option<u64>, issued_at: i64, serials: &[u64]) -> CrlSnapshot {
    let mut builder = CrlSnapshot::builder(at(issued_at))
        .entries(serials.iter().map(|s| RevokedEntry::new(*s, at(issued_at))));
    if let Some(number) = crl_number {
        builder = builder.crl_number(number);
    }
    builder.build().0
}

pub(crate) fn snapshot_with_reasons(
    crl_number: u64,
    entries: &[(u64, Option<RevocationReason>)],
) -> CrlSnapshot {
    CrlSnapshot::builder(at(1_700_000_000 + crl_number as i64))
        .crl_number(crl_number)
        .entries(entries.iter().map(|(serial, reason)| {
            let entry = RevokedEntry::new(*serial, at(1_690_000_000));
            match reason {
                Some(reason) => entry.with_reason(*reason),
                None => entry,
            }
        }))
        .build()
        .0
}

impl CrlBuilder {
    pub(crate) fn revoked_serial(
        self,
        serial: SerialNumber,
        when: DateTime<Utc>,
        reason: Option<u8>,
    ) -> Self {
        self.revoked_bytes(&serial.to_bytes_be(), when, reason)
    }
}
