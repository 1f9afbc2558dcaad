use async_trait::async_trait;

use crate::error::BackendError;

use super::types::TargetRecord;

mod json;
mod memory;

pub use json::JsonTargetRegistry;
pub use memory::MemoryTargetRegistry;

type Result<T> = std::result::Result<T, BackendError>;

/// Where the list of watched certificates lives.
#[async_trait]
pub trait TargetRegistry: Send + Sync + 'static {
    async fn load_targets(&self) -> Result<Vec<TargetRecord>>;

    /// Replaces the stored targets. Either all records are written or none.
    async fn save_targets(&self, targets: &[TargetRecord]) -> Result<()>;
}
