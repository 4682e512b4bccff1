//! Issues table
//!
//! One row per test issue key. The key column is not unique, so rows
//! written by older tools can be duplicated; callers check with
//! [`count_issue_rows`] and report duplicates instead of failing.

use crate::enrichment::EnrichedIssue;
use qa_sync_common::Result;
use sqlx::{Row, SqlitePool};

/// Stored issue row
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRow {
    pub test_id: i64,
    pub test_key: String,
    pub test_type: String,
    pub dist_channel: String,
    pub tester_id: Option<i64>,
    pub project_id: Option<i64>,
    pub time_hours: f64,
    pub software_version: String,
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Existing rows were overwritten
    Updated { rows: u64 },
}

/// Number of rows stored under a test key
pub async fn count_issue_rows(pool: &SqlitePool, test_key: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM issues WHERE test_key = ?")
        .bind(test_key)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Insert an enriched issue, or overwrite the stored rows for its key
///
/// Unresolved attributes are written as the `"Unknown"` sentinel.
pub async fn upsert_issue(
    pool: &SqlitePool,
    issue: &EnrichedIssue,
    tester_id: Option<i64>,
    project_id: i64,
) -> Result<UpsertOutcome> {
    let existing = count_issue_rows(pool, &issue.key).await?;

    if existing == 0 {
        sqlx::query(
            r#"
            INSERT INTO issues
                (test_key, test_type, dist_channel, tester_id, project_id, time_hours, software_version)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&issue.key)
        .bind(&issue.test_type)
        .bind(issue.channel_or_unknown())
        .bind(tester_id)
        .bind(project_id)
        .bind(issue.elapsed_hours)
        .bind(issue.version_or_unknown())
        .execute(pool)
        .await?;

        return Ok(UpsertOutcome::Inserted);
    }

    let result = sqlx::query(
        r#"
        UPDATE issues
        SET test_type = ?, dist_channel = ?, tester_id = ?, project_id = ?,
            time_hours = ?, software_version = ?, updated_at = CURRENT_TIMESTAMP
        WHERE test_key = ?
        "#,
    )
    .bind(&issue.test_type)
    .bind(issue.channel_or_unknown())
    .bind(tester_id)
    .bind(project_id)
    .bind(issue.elapsed_hours)
    .bind(issue.version_or_unknown())
    .bind(&issue.key)
    .execute(pool)
    .await?;

    Ok(UpsertOutcome::Updated {
        rows: result.rows_affected(),
    })
}

fn row_to_issue(row: &sqlx::sqlite::SqliteRow) -> IssueRow {
    IssueRow {
        test_id: row.get("test_id"),
        test_key: row.get("test_key"),
        test_type: row.get("test_type"),
        dist_channel: row.get("dist_channel"),
        tester_id: row.get("tester_id"),
        project_id: row.get("project_id"),
        time_hours: row.get("time_hours"),
        software_version: row.get("software_version"),
    }
}

/// First stored row for a test key
pub async fn load_issue(pool: &SqlitePool, test_key: &str) -> Result<Option<IssueRow>> {
    let row = sqlx::query(
        r#"
        SELECT test_id, test_key, test_type, dist_channel, tester_id, project_id,
               time_hours, software_version
        FROM issues
        WHERE test_key = ?
        ORDER BY test_id
        LIMIT 1
        "#,
    )
    .bind(test_key)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(row_to_issue))
}

/// All rows stored for a project, in insertion order
pub async fn load_project_issues(pool: &SqlitePool, project_key: &str) -> Result<Vec<IssueRow>> {
    let rows = sqlx::query(
        r#"
        SELECT i.test_id, i.test_key, i.test_type, i.dist_channel, i.tester_id, i.project_id,
               i.time_hours, i.software_version
        FROM issues i
        JOIN projects p ON p.project_id = i.project_id
        WHERE p.project_key = ?
        ORDER BY i.test_id
        "#,
    )
    .bind(project_key)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_issue).collect())
}
