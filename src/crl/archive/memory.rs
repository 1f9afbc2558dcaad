use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Result, SnapshotArchive};
use crate::crl::types::SnapshotId;

/// An in-memory snapshot archive.
///
/// Useful for testing and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryArchive {
    /// Raw bytes keyed by identifier, tagged with the save sequence number.
    snapshots: Arc<DashMap<SnapshotId, (u64, Vec<u8>)>>,
    saves: Arc<AtomicU64>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl SnapshotArchive for MemoryArchive {
    async fn save(&self, id: &SnapshotId, raw: &[u8]) -> Result<()> {
        let sequence = self.saves.fetch_add(1, Ordering::SeqCst);
        self.snapshots.insert(id.clone(), (sequence, raw.to_vec()));
        Ok(())
    }

    async fn load(&self, id: &SnapshotId) -> Result<Option<Vec<u8>>> {
        Ok(self.snapshots.get(id).map(|saved| saved.value().1.clone()))
    }

    async fn load_latest(&self) -> Result<Option<Vec<u8>>> {
        Ok(self
            .snapshots
            .iter()
            .max_by_key(|saved| saved.value().0)
            .map(|saved| saved.value().1.clone()))
    }
}
