//! Error ledger
//!
//! Accumulates error kinds per (scope, issue) pair for the end-of-run
//! report. A scope is an epic key, a project key, or [`UNKNOWN_SCOPE`]
//! when nothing better is resolvable. Kinds are closed enums per layer;
//! the numeric codes only appear when the ledger is reported.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Scope used when no epic can be resolved
pub const UNKNOWN_SCOPE: &str = "Unknown";

/// Scope of schema problems
pub const DATABASE_SCOPE: &str = "Database";

/// Issue-level failures of the enrichment engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EnrichmentFault {
    ParentLookupFailed,
    NoSuperEpicLink,
    TesterNotFound,
    VersionNotFound,
    SuperEpicLookupFailed,
}

/// Project metadata missing from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProjectFault {
    DeveloperNotFound,
    ProjectNameNotFound,
}

/// Persistence anomalies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StorageFault {
    /// Required table absent when the database was opened
    MissingTable,
    DuplicateIssue,
    TesterNotRegistered,
    NoProjectIssues,
}

/// Any ledgered error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LedgerCode {
    Enrichment(EnrichmentFault),
    Project(ProjectFault),
    Storage(StorageFault),
}

impl LedgerCode {
    /// Stable numeric code for reports
    pub fn code(self) -> u16 {
        match self {
            LedgerCode::Enrichment(EnrichmentFault::ParentLookupFailed) => 4301,
            LedgerCode::Enrichment(EnrichmentFault::NoSuperEpicLink) => 4302,
            LedgerCode::Enrichment(EnrichmentFault::TesterNotFound) => 4303,
            LedgerCode::Enrichment(EnrichmentFault::VersionNotFound) => 4304,
            LedgerCode::Enrichment(EnrichmentFault::SuperEpicLookupFailed) => 4305,
            LedgerCode::Project(ProjectFault::DeveloperNotFound) => 4401,
            LedgerCode::Project(ProjectFault::ProjectNameNotFound) => 4402,
            LedgerCode::Storage(StorageFault::MissingTable) => 3301,
            LedgerCode::Storage(StorageFault::DuplicateIssue) => 3401,
            LedgerCode::Storage(StorageFault::TesterNotRegistered) => 3501,
            LedgerCode::Storage(StorageFault::NoProjectIssues) => 3601,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LedgerCode::Enrichment(EnrichmentFault::ParentLookupFailed) => "parent lookup failed",
            LedgerCode::Enrichment(EnrichmentFault::NoSuperEpicLink) => "no SuperEpic link",
            LedgerCode::Enrichment(EnrichmentFault::TesterNotFound) => "tester not found",
            LedgerCode::Enrichment(EnrichmentFault::VersionNotFound) => "version not found",
            LedgerCode::Enrichment(EnrichmentFault::SuperEpicLookupFailed) => {
                "SuperEpic lookup failed"
            }
            LedgerCode::Project(ProjectFault::DeveloperNotFound) => "no developer for project",
            LedgerCode::Project(ProjectFault::ProjectNameNotFound) => "no name for project",
            LedgerCode::Storage(StorageFault::MissingTable) => "table missing",
            LedgerCode::Storage(StorageFault::DuplicateIssue) => "duplicate issue rows",
            LedgerCode::Storage(StorageFault::TesterNotRegistered) => "tester not registered",
            LedgerCode::Storage(StorageFault::NoProjectIssues) => "no issues stored for project",
        }
    }
}

impl fmt::Display for LedgerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

impl From<EnrichmentFault> for LedgerCode {
    fn from(fault: EnrichmentFault) -> Self {
        LedgerCode::Enrichment(fault)
    }
}

impl From<ProjectFault> for LedgerCode {
    fn from(fault: ProjectFault) -> Self {
        LedgerCode::Project(fault)
    }
}

impl From<StorageFault> for LedgerCode {
    fn from(fault: StorageFault) -> Self {
        LedgerCode::Storage(fault)
    }
}

/// Codes recorded for one (scope, issue) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub scope: String,
    pub issue: String,
    pub codes: Vec<LedgerCode>,
}

/// Append-only, de-duplicated error accumulation
#[derive(Debug, Default)]
pub struct ErrorLedger {
    entries: Vec<LedgerEntry>,
    index: HashMap<(String, String), usize>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `code` for (scope, issue); returns false if it was already present
    pub fn record(&mut self, scope: &str, issue: &str, code: impl Into<LedgerCode>) -> bool {
        let code = code.into();
        let key = (scope.to_string(), issue.to_string());

        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                self.entries.push(LedgerEntry {
                    scope: key.0.clone(),
                    issue: key.1.clone(),
                    codes: Vec::new(),
                });
                let position = self.entries.len() - 1;
                self.index.insert(key, position);
                position
            }
        };

        let codes = &mut self.entries[position].codes;
        if codes.contains(&code) {
            return false;
        }
        codes.push(code);
        true
    }

    /// Entries in first-recorded order
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Codes recorded for one pair (empty if none)
    pub fn codes_for(&self, scope: &str, issue: &str) -> &[LedgerCode] {
        self.index
            .get(&(scope.to_string(), issue.to_string()))
            .map(|&i| self.entries[i].codes.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `code` was recorded for any scope of `issue`
    pub fn has_code(&self, issue: &str, code: impl Into<LedgerCode>) -> bool {
        let code = code.into();
        self.entries
            .iter()
            .any(|e| e.issue == issue && e.codes.contains(&code))
    }

    /// Number of (scope, issue) pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of recorded codes
    pub fn total_codes(&self) -> usize {
        self.entries.iter().map(|e| e.codes.len()).sum()
    }
}
