//! Issue enrichment pipeline
//!
//! Derives distribution channel, software version and tester for raw
//! tracker issues by walking the parent epic and its SuperEpic link.

pub mod cache;
pub mod engine;
pub mod fields;
pub mod ledger;
pub mod model;

pub use cache::{AncestorCache, AncestorEntry};
pub use engine::{EnrichmentEngine, SUPER_EPIC_TYPE};
pub use fields::{FieldNameMap, FieldNotFoundError, UserListField, APPROVERS_FIELD};
pub use ledger::{
    EnrichmentFault, ErrorLedger, LedgerCode, LedgerEntry, ProjectFault, StorageFault,
    DATABASE_SCOPE, UNKNOWN_SCOPE,
};
pub use model::{Derived, EnrichedIssue, Unresolved, UNKNOWN};
