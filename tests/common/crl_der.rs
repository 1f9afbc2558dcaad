//! Unsigned v2 CRL writer shared by the unit and integration tests.
#![allow(dead_code)]

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Datelike, TimeZone, Utc};

/// sha256WithRSAEncryption. Only used as a placeholder, signatures are never checked.
const SIGNATURE_ALGORITHM: &[u8] = &[
    0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x0b, 0x05, 0x00,
];
const OID_COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];
const OID_CRL_NUMBER: &[u8] = &[0x55, 0x1d, 0x14];
const OID_REASON_CODE: &[u8] = &[0x55, 0x1d, 0x15];

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Writes unsigned v2 CRLs in DER.
pub struct CrlBuilder {
    issuer: String,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    crl_number: Option<u64>,
    revoked: Vec<(Vec<u8>, DateTime<Utc>, Option<u8>)>,
}

impl CrlBuilder {
    pub fn new(this_update: DateTime<Utc>) -> Self {
        Self {
            issuer: "Test CRL Issuer".to_string(),
            this_update,
            next_update: None,
            crl_number: None,
            revoked: Vec::new(),
        }
    }

    pub fn crl_number(mut self, number: u64) -> Self {
        self.crl_number = Some(number);
        self
    }

    pub fn next_update(mut self, next_update: DateTime<Utc>) -> Self {
        self.next_update = Some(next_update);
        self
    }

    pub fn revoked(self, serial: u64, when: DateTime<Utc>, reason: Option<u8>) -> Self {
        self.revoked_bytes(&serial.to_be_bytes(), when, reason)
    }

    /// Revoked entry with a big-endian serial of any length.
    pub fn revoked_bytes(mut self, serial: &[u8], when: DateTime<Utc>, reason: Option<u8>) -> Self {
        self.revoked.push((serial.to_vec(), when, reason));
        self
    }

    /// Every serial revoked at thisUpdate, without a reason.
    pub fn revoked_all(self, serials: &[u64]) -> Self {
        let when = self.this_update;
        serials
            .iter()
            .fold(self, |builder, serial| builder.revoked(*serial, when, None))
    }

    pub fn to_der(&self) -> Vec<u8> {
        let signature_algorithm = tlv(0x30, SIGNATURE_ALGORITHM);

        let common_name = [tlv(0x06, OID_COMMON_NAME), tlv(0x0c, self.issuer.as_bytes())].concat();
        let issuer = tlv(0x30, &tlv(0x31, &tlv(0x30, &common_name)));

        let mut tbs = integer(&[1]);
        tbs.extend(&signature_algorithm);
        tbs.extend(issuer);
        tbs.extend(time(self.this_update));
        if let Some(next_update) = self.next_update {
            tbs.extend(time(next_update));
        }

        if !self.revoked.is_empty() {
            let mut list = Vec::new();
            for (serial, when, reason) in &self.revoked {
                let mut entry = integer(serial);
                entry.extend(time(*when));
                if let Some(code) = reason {
                    let extension = [
                        tlv(0x06, OID_REASON_CODE),
                        tlv(0x04, &tlv(0x0a, &[*code])),
                    ]
                    .concat();
                    entry.extend(tlv(0x30, &tlv(0x30, &extension)));
                }
                list.extend(tlv(0x30, &entry));
            }
            tbs.extend(tlv(0x30, &list));
        }

        if let Some(number) = self.crl_number {
            let extension = [
                tlv(0x06, OID_CRL_NUMBER),
                tlv(0x04, &integer(&number.to_be_bytes())),
            ]
            .concat();
            tbs.extend(tlv(0xa0, &tlv(0x30, &tlv(0x30, &extension))));
        }

        let signature = tlv(0x03, &[0x00, 0xde, 0xad, 0xbe, 0xef]);

        tlv(
            0x30,
            &[tlv(0x30, &tbs), signature_algorithm, signature].concat(),
        )
    }

    pub fn to_pem(&self) -> String {
        let encoded = STANDARD.encode(self.to_der());
        let mut pem = String::from("-----BEGIN X509 CRL-----\n");
        for line in encoded.as_bytes().chunks(64) {
            pem.push_str(std::str::from_utf8(line).unwrap());
            pem.push('\n');
        }
        pem.push_str("-----END X509 CRL-----\n");
        pem
    }
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend(bytes);
    }
    out.extend_from_slice(content);
    out
}

/// Non-negative INTEGER from big-endian magnitude bytes.
fn integer(magnitude: &[u8]) -> Vec<u8> {
    let mut bytes: Vec<u8> = magnitude.iter().copied().skip_while(|b| *b == 0).collect();
    if bytes.first().is_none_or(|b| b & 0x80 != 0) {
        bytes.insert(0, 0);
    }
    tlv(0x02, &bytes)
}

fn time(value: DateTime<Utc>) -> Vec<u8> {
    if (1950..2050).contains(&value.year()) {
        tlv(0x17, value.format("%y%m%d%H%M%SZ").to_string().as_bytes())
    } else {
        tlv(0x18, value.format("%Y%m%d%H%M%SZ").to_string().as_bytes())
    }
}
