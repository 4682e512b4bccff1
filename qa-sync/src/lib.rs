//! qa-sync library
//!
//! Synchronizes test issues from the tracker into the QA database. Each
//! search result is enriched with the software version and distribution
//! channel of its parent epic and with the tester listed in the Approvers
//! field. Everything that cannot be resolved is collected in an error
//! ledger for the end-of-run report.

pub mod db;
pub mod enrichment;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod store;
pub mod tracker;

pub use crate::enrichment::{EnrichedIssue, ErrorLedger};
pub use crate::error::{SyncError, SyncResult};
pub use crate::notify::{ErrorReport, LogNotifier, Notifier, SmtpNotifier};
pub use crate::orchestrator::{BatchOrchestrator, ProjectContext, ProjectSummary, SyncRun};
pub use crate::store::{IssueSink, SqliteStore};
pub use crate::tracker::{InMemoryTracker, JiraClient, TrackerError, TrackerGateway};
