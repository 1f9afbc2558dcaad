use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Result, TargetRegistry};
use crate::targets::TargetRecord;

/// An in-memory target registry.
///
/// Useful for testing and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryTargetRegistry {
    targets: Arc<RwLock<Vec<TargetRecord>>>,
}

impl MemoryTargetRegistry {
    pub fn new(targets: Vec<TargetRecord>) -> Self {
        Self {
            targets: Arc::new(RwLock::new(targets)),
        }
    }

    pub async fn snapshot(&self) -> Vec<TargetRecord> {
        self.targets.read().await.clone()
    }
}

#[async_trait]
impl TargetRegistry for MemoryTargetRegistry {
    async fn load_targets(&self) -> Result<Vec<TargetRecord>> {
        Ok(self.targets.read().await.clone())
    }

    async fn save_targets(&self, targets: &[TargetRecord]) -> Result<()> {
        *self.targets.write().await = targets.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_registry_flow() {
        let registry = MemoryTargetRegistry::default();
        assert!(registry.load_targets().await.unwrap().is_empty());

        let mut record = TargetRecord::new(17u64);
        record.revoked = true;
        registry.save_targets(&[record.clone()]).await.unwrap();

        // Clones share the same backing list.
        let other = registry.clone();
        assert_eq!(other.load_targets().await.unwrap(), vec![record]);
    }
}
