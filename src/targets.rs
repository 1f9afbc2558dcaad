//! Target certificates watched for revocation.

mod reconciler;
mod registry;
mod types;

pub use reconciler::{NewlyFlaggedTarget, Reconciliation, reconcile, reconcile_scoped};
pub use registry::{JsonTargetRegistry, MemoryTargetRegistry, TargetRegistry};
pub use types::TargetRecord;
