use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crl::SerialNumber;

/// A certificate whose revocation status is tracked.
///
/// Any field other than the serial number, the revoked flag and the
/// distribution point is kept in `metadata` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub serial_number: SerialNumber,
    #[serde(default)]
    pub revoked: bool,
    /// CRL the serial number is checked against. Serial numbers are only
    /// unique per issuer, so records without one are only checked when a
    /// single distribution point is watched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_point: Option<String>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl TargetRecord {
    pub fn new(serial_number: impl Into<SerialNumber>) -> Self {
        Self {
            serial_number: serial_number.into(),
            revoked: false,
            distribution_point: None,
            metadata: Map::new(),
        }
    }

    pub fn with_distribution_point(mut self, distribution_point: impl Into<String>) -> Self {
        self.distribution_point = Some(distribution_point.into());
        self
    }

    /// Whether the record is checked against `distribution_point`, given
    /// how many distribution points are watched.
    pub fn is_checked_against(&self, distribution_point: &str, watched: usize) -> bool {
        match &self.distribution_point {
            Some(scope) => scope == distribution_point,
            None => watched == 1,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
