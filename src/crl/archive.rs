use async_trait::async_trait;

use crate::error::BackendError;

use super::types::SnapshotId;

mod file;
mod memory;

pub use file::FileArchive;
pub use memory::MemoryArchive;

type Result<T> = std::result::Result<T, BackendError>;

/// Persistence collaborator for the raw bytes of accepted CRLs.
#[async_trait]
pub trait SnapshotArchive: Send + Sync + 'static {
    /// Stores the encoded CRL under the given identifier.
    async fn save(&self, id: &SnapshotId, raw: &[u8]) -> Result<()>;

    /// Loads the encoded CRL archived under the given identifier, if any.
    async fn load(&self, id: &SnapshotId) -> Result<Option<Vec<u8>>>;

    /// Loads the most recently saved CRL, if any.
    async fn load_latest(&self) -> Result<Option<Vec<u8>>>;
}
