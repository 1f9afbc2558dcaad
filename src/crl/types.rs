use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use x509_parser::num_bigint::BigUint;

/// Error returned when user supplied text is not a valid serial number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseSerialError {
    #[error("serial number is empty")]
    Empty,

    #[error("serial number `{0}` is not hexadecimal")]
    InvalidDigit(String),
}

/// A certificate serial number.
///
/// Serial numbers are unbounded integers (RFC 5280 allows up to 20 octets and
/// some issuers exceed that), so they are never narrowed to a machine word.
/// Equality is integer equality: `0x00ab`, `AB` and `ab` are the same serial.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerialNumber(BigUint);

impl SerialNumber {
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Number of significant bits.
    pub fn bits(&self) -> u64 {
        self.0.bits()
    }

    /// Parse a hexadecimal serial as written in target lists and tool output.
    ///
    /// Accepts an optional `0x` prefix, either case, and `:` or whitespace
    /// separators (`01:A2:FF`).
    pub fn from_hex(text: &str) -> Result<Self, ParseSerialError> {
        let trimmed = text.trim();
        let trimmed = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let digits: String = trimmed
            .chars()
            .filter(|c| *c != ':' && !c.is_whitespace())
            .collect();

        if digits.is_empty() {
            return Err(ParseSerialError::Empty);
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseSerialError::InvalidDigit(text.to_string()));
        }

        BigUint::parse_bytes(digits.as_bytes(), 16)
            .map(Self)
            .ok_or_else(|| ParseSerialError::InvalidDigit(text.to_string()))
    }
}

impl From<BigUint> for SerialNumber {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl From<u64> for SerialNumber {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl FromStr for SerialNumber {
    type Err = ParseSerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Lowercase hex of the big-endian bytes, e.g. `0a1b2c`.
impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_bytes_be()))
    }
}

impl Serialize for SerialNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SerialNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SerialVisitor;

        impl Visitor<'_> for SerialVisitor {
            type Value = SerialNumber;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a hexadecimal serial number string or a non-negative integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                SerialNumber::from_hex(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(SerialNumber::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(SerialNumber::from)
                    .map_err(|_| E::custom(format!("serial number {v} is negative")))
            }
        }

        deserializer.deserialize_any(SerialVisitor)
    }
}

/// Value of the CRL number extension (RFC 5280 §5.2.3).
///
/// Monotonically increasing per issuer and up to 20 octets long.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CrlNumber(BigUint);

impl CrlNumber {
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// The number of the issuance immediately before this one.
    pub fn predecessor(&self) -> Option<CrlNumber> {
        if self.0.bits() == 0 {
            return None;
        }
        Some(CrlNumber(self.0.clone() - 1u32))
    }
}

impl From<BigUint> for CrlNumber {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl From<u64> for CrlNumber {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl fmt::Display for CrlNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// Decimal string: CRL numbers can exceed what JSON consumers parse as numbers.
impl Serialize for CrlNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Revocation reason codes, RFC 5280 §5.3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    Unspecified = 0,
    KeyCompromise = 1,
    CaCompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    // 7 is not used.
    RemoveFromCrl = 8,
    PrivilegeWithdrawn = 9,
    AaCompromise = 10,
}

impl RevocationReason {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RevocationReason {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unspecified),
            1 => Ok(Self::KeyCompromise),
            2 => Ok(Self::CaCompromise),
            3 => Ok(Self::AffiliationChanged),
            4 => Ok(Self::Superseded),
            5 => Ok(Self::CessationOfOperation),
            6 => Ok(Self::CertificateHold),
            8 => Ok(Self::RemoveFromCrl),
            9 => Ok(Self::PrivilegeWithdrawn),
            10 => Ok(Self::AaCompromise),
            other => Err(other),
        }
    }
}

/// One revoked certificate as listed in a CRL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevokedEntry {
    pub serial_number: SerialNumber,
    pub revocation_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RevocationReason>,
}

impl RevokedEntry {
    pub fn new(serial_number: impl Into<SerialNumber>, revocation_time: DateTime<Utc>) -> Self {
        Self {
            serial_number: serial_number.into(),
            revocation_time,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: RevocationReason) -> Self {
        self.reason = Some(reason);
        self
    }
}

/// Two entries of one CRL that carried the same serial number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSerial {
    pub serial_number: SerialNumber,
    pub kept: RevokedEntry,
    pub discarded: RevokedEntry,
}

/// Identifier under which a snapshot's raw bytes are archived.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SnapshotId {
    Number(CrlNumber),
    /// Issuers that omit the CRL number are keyed by their thisUpdate time.
    IssuedAt(DateTime<Utc>),
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotId::Number(number) => write!(f, "{number}"),
            SnapshotId::IssuedAt(issued_at) => write!(f, "t{}", issued_at.timestamp()),
        }
    }
}

/// Parsed, immutable view of a single CRL issuance.
///
/// Snapshots are only created through [`SnapshotBuilder`] (which the parser
/// uses) and are shared as `Arc<CrlSnapshot>` afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlSnapshot {
    crl_number: Option<CrlNumber>,
    issuer: String,
    issued_at: DateTime<Utc>,
    next_update_at: Option<DateTime<Utc>>,
    revoked_entries: BTreeMap<SerialNumber, RevokedEntry>,
    raw_bytes: Arc<[u8]>,
}

impl CrlSnapshot {
    pub fn builder(issued_at: DateTime<Utc>) -> SnapshotBuilder {
        SnapshotBuilder::new(issued_at)
    }

    pub fn crl_number(&self) -> Option<&CrlNumber> {
        self.crl_number.as_ref()
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The CRL's thisUpdate time.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn next_update_at(&self) -> Option<DateTime<Utc>> {
        self.next_update_at
    }

    /// The encoded CRL exactly as it was received.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub fn len(&self) -> usize {
        self.revoked_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked_entries.is_empty()
    }

    pub fn get(&self, serial_number: &SerialNumber) -> Option<&RevokedEntry> {
        self.revoked_entries.get(serial_number)
    }

    pub fn contains(&self, serial_number: &SerialNumber) -> bool {
        self.revoked_entries.contains_key(serial_number)
    }

    /// Revoked entries in ascending serial number order.
    pub fn entries(&self) -> impl Iterator<Item = &RevokedEntry> {
        self.revoked_entries.values()
    }

    pub fn identifier(&self) -> SnapshotId {
        match &self.crl_number {
            Some(number) => SnapshotId::Number(number.clone()),
            None => SnapshotId::IssuedAt(self.issued_at),
        }
    }

    /// Whether the issuer's announced nextUpdate lies before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.next_update_at.is_some_and(|next| now > next)
    }
}

/// Assembles a [`CrlSnapshot`], resolving duplicate serial numbers.
#[derive(Debug)]
pub struct SnapshotBuilder {
    crl_number: Option<CrlNumber>,
    issuer: String,
    issued_at: DateTime<Utc>,
    next_update_at: Option<DateTime<Utc>>,
    revoked_entries: BTreeMap<SerialNumber, RevokedEntry>,
    duplicates: Vec<DuplicateSerial>,
    raw_bytes: Arc<[u8]>,
}

impl SnapshotBuilder {
    fn new(issued_at: DateTime<Utc>) -> Self {
        Self {
            crl_number: None,
            issuer: String::new(),
            issued_at,
            next_update_at: None,
            revoked_entries: BTreeMap::new(),
            duplicates: Vec::new(),
            raw_bytes: Arc::from(Vec::new()),
        }
    }

    pub fn crl_number(mut self, number: impl Into<CrlNumber>) -> Self {
        self.crl_number = Some(number.into());
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn next_update_at(mut self, next_update_at: DateTime<Utc>) -> Self {
        self.next_update_at = Some(next_update_at);
        self
    }

    pub fn raw_bytes(mut self, raw_bytes: impl Into<Arc<[u8]>>) -> Self {
        self.raw_bytes = raw_bytes.into();
        self
    }

    pub fn entry(mut self, entry: RevokedEntry) -> Self {
        self.push(entry);
        self
    }

    pub fn entries(mut self, entries: impl IntoIterator<Item = RevokedEntry>) -> Self {
        for entry in entries {
            self.push(entry);
        }
        self
    }

    /// Adds an entry. On a repeated serial the entry with the later
    /// revocation time wins; on a tie the first one seen is kept.
    pub fn push(&mut self, entry: RevokedEntry) {
        match self.revoked_entries.entry(entry.serial_number.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(mut slot) => {
                let serial_number = entry.serial_number.clone();
                let duplicate = if entry.revocation_time > slot.get().revocation_time {
                    let discarded = slot.insert(entry.clone());
                    DuplicateSerial {
                        serial_number,
                        kept: entry,
                        discarded,
                    }
                } else {
                    DuplicateSerial {
                        serial_number,
                        kept: slot.get().clone(),
                        discarded: entry,
                    }
                };
                self.duplicates.push(duplicate);
            }
        }
    }

    /// Finishes the snapshot, returning any duplicates that were resolved.
    pub fn build(self) -> (CrlSnapshot, Vec<DuplicateSerial>) {
        let snapshot = CrlSnapshot {
            crl_number: self.crl_number,
            issuer: self.issuer,
            issued_at: self.issued_at,
            next_update_at: self.next_update_at,
            revoked_entries: self.revoked_entries,
            raw_bytes: self.raw_bytes,
        };
        (snapshot, self.duplicates)
    }
}
