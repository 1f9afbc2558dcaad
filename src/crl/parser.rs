use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

use super::errors::{CrlError, CrlResult};
use super::events::CrlEvent;
use super::types::{
    CrlNumber, CrlSnapshot, DuplicateSerial, RevocationReason, RevokedEntry, SerialNumber,
};

/// Smallest encoding that can hold a CertificateList: the outer and TBS
/// sequence headers, a one-byte OID algorithm identifier (twice), an empty
/// issuer name, a UTCTime thisUpdate and an empty signature bit string.
pub const MIN_CRL_LEN: usize = 34;

const PEM_CRL_LABEL: &str = "X509 CRL";

/// Result of parsing one fetched CRL.
#[derive(Debug, Clone)]
pub struct ParsedCrl {
    pub snapshot: CrlSnapshot,
    /// Repeated serial numbers that were collapsed into a single entry.
    pub duplicates: Vec<DuplicateSerial>,
}

impl ParsedCrl {
    pub fn events(&self) -> Vec<CrlEvent> {
        self.duplicates.iter().map(CrlEvent::from).collect()
    }
}

impl CrlSnapshot {
    /// Parse a CRL, logging (rather than returning) resolved duplicates.
    pub fn from_der(raw: &[u8]) -> CrlResult<Self> {
        let parsed = parse(raw)?;
        for duplicate in &parsed.duplicates {
            warn!(
                serial_number = %duplicate.serial_number,
                "Duplicate serial number in CRL, kept the later revocation"
            );
        }
        Ok(parsed.snapshot)
    }
}

/// Decode a DER (or PEM armoured) CRL into a snapshot.
///
/// Input is untrusted: every decoding problem is reported as
/// [`CrlError::MalformedInput`], never as a panic. The CRL signature is not
/// checked.
pub fn parse(raw: &[u8]) -> CrlResult<ParsedCrl> {
    if raw.is_empty() {
        return Err(CrlError::MalformedInput("empty input".to_string()));
    }

    let der = if is_pem(raw) {
        decode_pem(raw)?
    } else {
        raw.to_vec()
    };

    if der.len() < MIN_CRL_LEN {
        return Err(CrlError::MalformedInput(format!(
            "{} bytes is shorter than the smallest possible CRL",
            der.len()
        )));
    }

    let builder = {
        let (rest, crl) = CertificateRevocationList::from_der(&der)
            .map_err(|e| CrlError::MalformedInput(format!("CRL decoding failed: {e}")))?;

        if !rest.is_empty() {
            return Err(CrlError::MalformedInput(format!(
                "{} trailing bytes after CRL",
                rest.len()
            )));
        }

        let issued_at = asn1_time_to_utc(&crl.last_update())
            .ok_or(CrlError::MissingRequiredField("thisUpdate"))?;

        let mut builder = CrlSnapshot::builder(issued_at).issuer(crl.issuer().to_string());

        if let Some(number) = crl.crl_number() {
            builder = builder.crl_number(CrlNumber::from(number.clone()));
        }

        if let Some(next_update) = crl.next_update() {
            match asn1_time_to_utc(&next_update) {
                Some(next_update_at) => builder = builder.next_update_at(next_update_at),
                None => debug!("Ignoring out of range nextUpdate {}", next_update),
            }
        }

        for revoked in crl.iter_revoked_certificates() {
            builder.push(revoked_entry(revoked)?);
        }

        builder
    };

    let (snapshot, duplicates) = builder.raw_bytes(der).build();

    debug!(
        crl_number = ?snapshot.crl_number().map(ToString::to_string),
        issued_at = %snapshot.issued_at(),
        revoked = snapshot.len(),
        duplicates = duplicates.len(),
        "Parsed CRL"
    );

    Ok(ParsedCrl {
        snapshot,
        duplicates,
    })
}

fn revoked_entry(revoked: &RevokedCertificate<'_>) -> CrlResult<RevokedEntry> {
    let serial_number = SerialNumber::from(revoked.user_certificate.clone());

    let revocation_time = asn1_time_to_utc(&revoked.revocation_date).ok_or_else(|| {
        CrlError::MalformedInput(format!(
            "revocation date of {serial_number} is out of range"
        ))
    })?;

    let mut entry = RevokedEntry::new(serial_number, revocation_time);

    if let Some((_critical, code)) = revoked.reason_code() {
        match RevocationReason::try_from(code.0) {
            Ok(reason) => entry = entry.with_reason(reason),
            Err(unknown) => debug!(
                serial_number = %entry.serial_number,
                "Ignoring unknown revocation reason code {}",
                unknown
            ),
        }
    }

    Ok(entry)
}

/// UTCTime and GeneralizedTime are both UTC in DER, so no zone adjustment is needed.
fn asn1_time_to_utc(time: &ASN1Time) -> Option<DateTime<Utc>> {
    let datetime = time.to_datetime();
    DateTime::<Utc>::from_timestamp(datetime.unix_timestamp(), datetime.nanosecond())
}

fn is_pem(raw: &[u8]) -> bool {
    raw.trim_ascii_start().starts_with(b"-----BEGIN")
}

fn decode_pem(raw: &[u8]) -> CrlResult<Vec<u8>> {
    let (_, pem) = parse_x509_pem(raw)
        .map_err(|e| CrlError::MalformedInput(format!("PEM decoding failed: {e}")))?;

    if pem.label != PEM_CRL_LABEL {
        return Err(CrlError::MalformedInput(format!(
            "unexpected PEM block `{}`",
            pem.label
        )));
    }

    Ok(pem.contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CrlBuilder, at, big_serial};

    #[test]
    fn test_parse_full_crl() {
        let der = CrlBuilder::new(at(1_700_000_000))
            .crl_number(4242)
            .next_update(at(1_700_086_400))
            .revoked(0x10, at(1_699_000_000), None)
            .revoked(0x20, at(1_699_100_000), Some(1))
            .revoked(0x30, at(1_699_200_000), Some(6))
            .to_der();

        let parsed = parse(&der).unwrap();
        let snapshot = parsed.snapshot;

        assert!(parsed.duplicates.is_empty());
        assert_eq!(snapshot.crl_number(), Some(&CrlNumber::from(4242u64)));
        assert_eq!(snapshot.issued_at(), at(1_700_000_000));
        assert_eq!(snapshot.next_update_at(), Some(at(1_700_086_400)));
        assert_eq!(snapshot.issuer(), "CN=Test CRL Issuer");
        assert_eq!(snapshot.raw_bytes(), der.as_slice());
        assert_eq!(snapshot.len(), 3);

        let hold = snapshot.get(&SerialNumber::from(0x30u64)).unwrap();
        assert_eq!(hold.reason, Some(RevocationReason::CertificateHold));
        assert_eq!(hold.revocation_time, at(1_699_200_000));

        let compromised = snapshot.get(&SerialNumber::from(0x20u64)).unwrap();
        assert_eq!(compromised.reason, Some(RevocationReason::KeyCompromise));

        assert_eq!(snapshot.get(&SerialNumber::from(0x10u64)).unwrap().reason, None);
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let der = CrlBuilder::new(at(1_700_000_000))
            .revoked(1, at(1_699_000_000), None)
            .to_der();

        let snapshot = parse(&der).unwrap().snapshot;
        assert_eq!(snapshot.crl_number(), None);
        assert_eq!(snapshot.next_update_at(), None);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_empty_revocation_list() {
        let der = CrlBuilder::new(at(1_700_000_000)).crl_number(1).to_der();
        let snapshot = parse(&der).unwrap().snapshot;
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_generalized_time_after_2049() {
        let der = CrlBuilder::new(at(2_600_000_000))
            .next_update(at(2_600_086_400))
            .revoked(5, at(2_599_000_000), None)
            .to_der();

        let snapshot = parse(&der).unwrap().snapshot;
        assert_eq!(snapshot.issued_at(), at(2_600_000_000));
        assert_eq!(snapshot.next_update_at(), Some(at(2_600_086_400)));
    }

    #[test]
    fn test_unknown_reason_code_leaves_reason_unset() {
        let der = CrlBuilder::new(at(1_700_000_000))
            .revoked(9, at(1_699_000_000), Some(7))
            .to_der();

        let snapshot = parse(&der).unwrap().snapshot;
        let entry = snapshot.get(&SerialNumber::from(9u64)).unwrap();
        assert_eq!(entry.reason, None);
    }

    #[test]
    fn test_large_serial_survives_parsing() {
        let serial = big_serial();
        let der = CrlBuilder::new(at(1_700_000_000))
            .revoked_serial(serial.clone(), at(1_699_000_000), None)
            .to_der();

        let snapshot = parse(&der).unwrap().snapshot;
        assert!(snapshot.contains(&serial));
        assert_eq!(serial.to_bytes_be().len(), 20);
    }

    #[test]
    fn test_duplicates_are_resolved_and_reported() {
        let der = CrlBuilder::new(at(1_700_000_000))
            .revoked(0x42, at(1_699_000_000), Some(6))
            .revoked(0x42, at(1_699_500_000), Some(1))
            .to_der();

        let parsed = parse(&der).unwrap();
        assert_eq!(parsed.snapshot.len(), 1);
        let kept = parsed.snapshot.get(&SerialNumber::from(0x42u64)).unwrap();
        assert_eq!(kept.revocation_time, at(1_699_500_000));
        assert_eq!(kept.reason, Some(RevocationReason::KeyCompromise));

        assert_eq!(
            parsed.events(),
            vec![CrlEvent::DuplicateSerialNumber {
                serial_number: SerialNumber::from(0x42u64),
                kept_revocation_time: at(1_699_500_000),
                discarded_revocation_time: at(1_699_000_000),
            }]
        );
    }

    #[test]
    fn test_pem_input() {
        let builder = CrlBuilder::new(at(1_700_000_000))
            .crl_number(77)
            .revoked(3, at(1_699_000_000), None);
        let der = builder.to_der();

        let snapshot = parse(builder.to_pem().as_bytes()).unwrap().snapshot;
        assert_eq!(snapshot.crl_number(), Some(&CrlNumber::from(77u64)));
        assert_eq!(snapshot.raw_bytes(), der.as_slice());
    }

    #[test]
    fn test_pem_with_wrong_label_is_rejected() {
        let pem = CrlBuilder::new(at(1_700_000_000))
            .to_pem()
            .replace("X509 CRL", "CERTIFICATE");
        assert!(matches!(
            parse(pem.as_bytes()),
            Err(CrlError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_empty_input_is_malformed() {
        assert!(matches!(parse(&[]), Err(CrlError::MalformedInput(_))));
    }

    #[test]
    fn test_short_input_is_malformed() {
        assert!(matches!(
            parse(&[0x30, 0x03, 0x02, 0x01, 0x01]),
            Err(CrlError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_unrelated_binary_is_malformed() {
        let mut png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        png.extend(std::iter::repeat_n(0xAB, 64));
        assert!(matches!(parse(&png), Err(CrlError::MalformedInput(_))));

        let mut zip = b"PK\x03\x04\x14\0\0\0\x08\0".to_vec();
        zip.extend(std::iter::repeat_n(0x00, 64));
        assert!(matches!(parse(&zip), Err(CrlError::MalformedInput(_))));
    }

    #[test]
    fn test_truncated_crl_is_malformed() {
        let der = CrlBuilder::new(at(1_700_000_000))
            .crl_number(1)
            .revoked(1, at(1_699_000_000), None)
            .to_der();
        assert!(matches!(
            parse(&der[..der.len() - 10]),
            Err(CrlError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_are_malformed() {
        let mut der = CrlBuilder::new(at(1_700_000_000)).to_der();
        der.extend_from_slice(&[0x00, 0x00]);
        assert!(matches!(parse(&der), Err(CrlError::MalformedInput(_))));
    }

    #[test]
    fn test_from_der_drops_duplicate_details() {
        let der = CrlBuilder::new(at(1_700_000_000))
            .revoked(1, at(1_699_000_000), None)
            .revoked(1, at(1_699_000_001), None)
            .to_der();
        let snapshot = CrlSnapshot::from_der(&der).unwrap();
        assert_eq!(snapshot.len(), 1);
    }
}
