use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::BackendError;

use super::archive::SnapshotArchive;
use super::errors::CrlError;
use super::events::CrlEvent;
use super::parser;
use super::types::{CrlNumber, CrlSnapshot, SnapshotId};

/// Snapshot store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Snapshot archive unavailable: {0}")]
    Archive(#[source] BackendError),

    #[error("Archived CRL {id} can no longer be parsed: {source}")]
    Corrupt {
        id: SnapshotId,
        #[source]
        source: CrlError,
    },

    #[error("Newest archived CRL can no longer be parsed: {0}")]
    UnreadableLatest(#[source] CrlError),

    #[error("Archived CRL {id} carries CRL number {found:?}")]
    Mismatch {
        id: SnapshotId,
        found: Option<CrlNumber>,
    },
}

/// Why a fetched CRL was refused as older than the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StaleReason {
    LowerCrlNumber {
        current: CrlNumber,
        received: CrlNumber,
    },
    OlderIssueTime {
        current: DateTime<Utc>,
        received: DateTime<Utc>,
    },
}

/// How a candidate snapshot compares to the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Newer { degraded: bool },
    Same { degraded: bool },
    Stale(StaleReason),
}

/// Outcome of [`SnapshotStore::accept`].
#[derive(Debug, Clone)]
pub enum AcceptDecision {
    Accepted {
        snapshot: Arc<CrlSnapshot>,
        /// The snapshot that was current before this one.
        previous: Option<Arc<CrlSnapshot>>,
        /// Ordering had to fall back to thisUpdate because a CRL number was missing.
        degraded: bool,
    },
    Unchanged {
        crl_number: Option<CrlNumber>,
        issued_at: DateTime<Utc>,
    },
    Stale {
        reason: StaleReason,
    },
}

impl AcceptDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AcceptDecision::Accepted { .. })
    }

    pub fn events(&self) -> Vec<CrlEvent> {
        match self {
            AcceptDecision::Accepted {
                snapshot, degraded, ..
            } => {
                let mut events = vec![CrlEvent::SnapshotAccepted {
                    crl_number: snapshot.crl_number().cloned(),
                    issued_at: snapshot.issued_at(),
                    revoked_count: snapshot.len(),
                    degraded: *degraded,
                }];
                if *degraded {
                    events.push(CrlEvent::DegradedOrderingMode {
                        issued_at: snapshot.issued_at(),
                    });
                }
                events
            }
            AcceptDecision::Unchanged {
                crl_number,
                issued_at,
            } => vec![CrlEvent::SnapshotUnchanged {
                crl_number: crl_number.clone(),
                issued_at: *issued_at,
            }],
            AcceptDecision::Stale { reason } => vec![CrlEvent::SnapshotStale {
                reason: reason.clone(),
            }],
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    current: Option<Arc<CrlSnapshot>>,
    previous: Option<Arc<CrlSnapshot>>,
}

/// Holds the accepted snapshot of one distribution point.
///
/// Every distribution point gets its own store; nothing is shared between
/// stores. Older issuances are retrieved through the archive collaborator.
#[derive(Debug)]
pub struct SnapshotStore<A: SnapshotArchive> {
    archive: A,
    state: RwLock<StoreState>,
    accept_lock: Mutex<()>,
}

impl<A: SnapshotArchive> SnapshotStore<A> {
    pub fn new(archive: A) -> Self {
        Self {
            archive,
            state: RwLock::new(StoreState::default()),
            accept_lock: Mutex::new(()),
        }
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn get_current(&self) -> Option<Arc<CrlSnapshot>> {
        self.read_state().current.clone()
    }

    /// Compare a candidate against the current snapshot without changing anything.
    pub fn evaluate(&self, candidate: &CrlSnapshot) -> Evaluation {
        match self.get_current() {
            Some(current) => evaluate(&current, candidate),
            None => Evaluation::Newer {
                degraded: candidate.crl_number().is_none(),
            },
        }
    }

    /// Make `snapshot` current if it supersedes the current one.
    ///
    /// The raw bytes are archived before the snapshot becomes current; if the
    /// archive fails the error is returned and the store is left as it was.
    pub async fn accept(&self, snapshot: CrlSnapshot) -> Result<AcceptDecision, StoreError> {
        let _guard = self.accept_lock.lock().await;

        let degraded = match self.evaluate(&snapshot) {
            Evaluation::Newer { degraded } => degraded,
            Evaluation::Same { .. } => {
                return Ok(AcceptDecision::Unchanged {
                    crl_number: snapshot.crl_number().cloned(),
                    issued_at: snapshot.issued_at(),
                });
            }
            Evaluation::Stale(reason) => return Ok(AcceptDecision::Stale { reason }),
        };

        let id = snapshot.identifier();
        self.archive
            .save(&id, snapshot.raw_bytes())
            .await
            .map_err(StoreError::Archive)?;

        let snapshot = Arc::new(snapshot);
        let previous = {
            let mut state = self.write_state();
            let previous = state.current.replace(Arc::clone(&snapshot));
            state.previous = previous.clone();
            previous
        };

        debug!(%id, degraded, "Accepted CRL snapshot");

        Ok(AcceptDecision::Accepted {
            snapshot,
            previous,
            degraded,
        })
    }

    /// Make the most recently archived issuance current again.
    ///
    /// Only an empty store is seeded and nothing is archived again. Returns the
    /// restored snapshot, or `None` when there was nothing to restore.
    pub async fn restore(&self) -> Result<Option<Arc<CrlSnapshot>>, StoreError> {
        let _guard = self.accept_lock.lock().await;
        if self.get_current().is_some() {
            return Ok(None);
        }

        let Some(raw) = self.archive.load_latest().await.map_err(StoreError::Archive)? else {
            return Ok(None);
        };
        let snapshot = parser::parse(&raw)
            .map_err(StoreError::UnreadableLatest)?
            .snapshot;

        let snapshot = Arc::new(snapshot);
        self.write_state().current = Some(Arc::clone(&snapshot));
        debug!(id = %snapshot.identifier(), "Restored CRL snapshot from archive");

        Ok(Some(snapshot))
    }

    /// Find the snapshot with the given CRL number, in memory or in the archive.
    pub async fn lookup_by_number(
        &self,
        number: &CrlNumber,
    ) -> Result<Option<Arc<CrlSnapshot>>, StoreError> {
        {
            let state = self.read_state();
            let held = [&state.current, &state.previous]
                .into_iter()
                .flatten()
                .find(|s| s.crl_number() == Some(number));
            if let Some(snapshot) = held {
                return Ok(Some(Arc::clone(snapshot)));
            }
        }

        let id = SnapshotId::Number(number.clone());
        let Some(raw) = self.archive.load(&id).await.map_err(StoreError::Archive)? else {
            return Ok(None);
        };

        let snapshot = match parser::parse(&raw) {
            Ok(parsed) => parsed.snapshot,
            Err(source) => return Err(StoreError::Corrupt { id, source }),
        };

        if snapshot.crl_number() != Some(number) {
            return Err(StoreError::Mismatch {
                id,
                found: snapshot.crl_number().cloned(),
            });
        }

        Ok(Some(Arc::new(snapshot)))
    }

    /// The issuance numbered one less than `snapshot`, if it can be found.
    pub async fn lookup_predecessor(
        &self,
        snapshot: &CrlSnapshot,
    ) -> Result<Option<Arc<CrlSnapshot>>, StoreError> {
        match snapshot.crl_number().and_then(CrlNumber::predecessor) {
            Some(number) => self.lookup_by_number(&number).await,
            None => Ok(None),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn evaluate(current: &CrlSnapshot, candidate: &CrlSnapshot) -> Evaluation {
    if let (Some(current_number), Some(candidate_number)) =
        (current.crl_number(), candidate.crl_number())
    {
        return match candidate_number.cmp(current_number) {
            std::cmp::Ordering::Greater => Evaluation::Newer { degraded: false },
            std::cmp::Ordering::Equal => {
                if candidate.issued_at() != current.issued_at() {
                    warn!(
                        crl_number = %candidate_number,
                        current = %current.issued_at(),
                        received = %candidate.issued_at(),
                        "Same CRL number published with a different thisUpdate"
                    );
                }
                Evaluation::Same { degraded: false }
            }
            std::cmp::Ordering::Less => Evaluation::Stale(StaleReason::LowerCrlNumber {
                current: current_number.clone(),
                received: candidate_number.clone(),
            }),
        };
    }

    match candidate.issued_at().cmp(&current.issued_at()) {
        std::cmp::Ordering::Greater => Evaluation::Newer { degraded: true },
        std::cmp::Ordering::Equal => Evaluation::Same { degraded: true },
        std::cmp::Ordering::Less => Evaluation::Stale(StaleReason::OlderIssueTime {
            current: current.issued_at(),
            received: candidate.issued_at(),
        }),
    }
}
