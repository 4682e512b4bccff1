//! Persistence sink
//!
//! [`IssueSink`] receives each enriched batch. [`SqliteStore`] writes it to
//! the issues table, resolving tester and project foreign keys on the way.

use crate::db::directory::{ensure_project, find_tester_id};
use crate::db::issues::{count_issue_rows, load_project_issues, upsert_issue, IssueRow};
use crate::enrichment::{EnrichedIssue, ErrorLedger, StorageFault};
use crate::error::SyncResult;
use crate::orchestrator::ProjectContext;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

/// Destination of enriched batches
#[async_trait]
pub trait IssueSink: Send + Sync {
    /// Store one project's batch; returns the number of issues written
    async fn store(
        &self,
        project: &ProjectContext,
        issues: &[EnrichedIssue],
        ledger: &mut ErrorLedger,
    ) -> SyncResult<usize>;
}

/// SQLite-backed sink
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Issues stored for a project; an empty project is ledgered
    pub async fn project_issues(
        &self,
        project_key: &str,
        ledger: &mut ErrorLedger,
    ) -> SyncResult<Vec<IssueRow>> {
        let rows = load_project_issues(&self.pool, project_key).await?;
        if rows.is_empty() {
            error!(project = %project_key, "No issues stored for project");
            ledger.record(project_key, project_key, StorageFault::NoProjectIssues);
        }
        Ok(rows)
    }

    async fn tester_id(
        &self,
        project: &ProjectContext,
        issue: &EnrichedIssue,
        ledger: &mut ErrorLedger,
    ) -> SyncResult<Option<i64>> {
        // Unresolved testers were already ledgered during enrichment
        let Some(tester) = issue.tester.value() else {
            return Ok(None);
        };

        let id = find_tester_id(&self.pool, tester).await?;
        if id.is_none() {
            warn!(issue = %issue.key, tester = %tester, "Tester not registered in database");
            ledger.record(&project.key, &issue.key, StorageFault::TesterNotRegistered);
        }
        Ok(id)
    }
}

#[async_trait]
impl IssueSink for SqliteStore {
    async fn store(
        &self,
        project: &ProjectContext,
        issues: &[EnrichedIssue],
        ledger: &mut ErrorLedger,
    ) -> SyncResult<usize> {
        let project_id = ensure_project(
            &self.pool,
            &project.key,
            project.developer.as_deref(),
            project.name.as_deref(),
        )
        .await?;

        let mut stored = 0;
        for issue in issues {
            let tester_id = self.tester_id(project, issue, ledger).await?;

            if count_issue_rows(&self.pool, &issue.key).await? > 1 {
                error!(issue = %issue.key, "Issue stored more than once");
                ledger.record(&project.key, &issue.key, StorageFault::DuplicateIssue);
            }

            let outcome = upsert_issue(&self.pool, issue, tester_id, project_id).await?;
            debug!(issue = %issue.key, ?outcome, "Issue stored");
            stored += 1;
        }

        self.project_issues(&project.key, ledger).await?;

        info!(project = %project.key, stored, "Project batch stored");
        Ok(stored)
    }
}
