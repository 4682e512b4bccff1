//! Error types for qa-sync
//!
//! Only batch-level failures are errors. Issue-level problems are absorbed
//! by the enrichment engine and end up in the error ledger instead.

use crate::tracker::TrackerError;
use thiserror::Error;

/// Fatal errors of a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    /// Credentials rejected or tracker unreachable at session start
    #[error("Tracker session failed: {0}")]
    Session(TrackerError),

    /// Field catalog could not be read at session start
    #[error("Field catalog unavailable: {0}")]
    FieldCatalog(TrackerError),

    /// Issue search for a project failed
    #[error("Issue search for project {project} failed: {source}")]
    BatchFetch {
        project: String,
        #[source]
        source: TrackerError,
    },

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] qa_sync_common::Error),
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Storage(qa_sync_common::Error::Database(err))
    }
}

impl SyncError {
    /// Numeric code used in error reports
    pub fn report_code(&self) -> u16 {
        match self {
            SyncError::Session(e) | SyncError::FieldCatalog(e) => e.report_code(),
            SyncError::BatchFetch { source, .. } => source.report_code(),
            SyncError::Storage(_) => 3201,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
