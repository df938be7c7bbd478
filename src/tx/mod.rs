//! Units of work.
//!
//! Every upsert runs inside exactly one caller-visible transaction: the
//! caller opens it, the protocol writes through it, the caller commits or
//! rolls back. What a rollback actually undoes is the backend's business.

use serde::{Deserialize, Serialize};

use crate::storage::StorageBackend;
use crate::{Error, Result};

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

impl TxMode {
    pub fn allows_writes(self) -> bool {
        matches!(self, TxMode::ReadWrite)
    }
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Transaction handle that all backends provide.
pub trait Transaction: Send + Sync {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;

    /// Reject a write issued through a read-only transaction.
    fn ensure_writable(&self) -> Result<()> {
        if self.mode().allows_writes() {
            Ok(())
        } else {
            Err(Error::Storage(format!("write attempted in read-only {}", self.id())))
        }
    }
}

/// Close `tx` according to `result`: commit on `Ok`, roll back on `Err`.
///
/// A failed rollback is logged and the original error is returned.
pub async fn finish<B: StorageBackend, T>(backend: &B, tx: B::Tx, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            backend.commit_tx(tx).await?;
            Ok(value)
        }
        Err(e) => {
            let id = tx.id();
            if let Err(rollback) = backend.rollback_tx(tx).await {
                tracing::warn!(tx = %id, error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}
