//! Database access for qa-sync
//!
//! SQLite store holding testers, projects and the synchronized test issues.

pub mod directory;
pub mod issues;

use crate::enrichment::{ErrorLedger, StorageFault, DATABASE_SCOPE};
use qa_sync_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Tables the sync writes to
pub const REQUIRED_TABLES: [&str; 3] = ["testers", "projects", "issues"];

/// Open the database file, creating it (but no tables) if absent
pub async fn open_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    Ok(SqlitePool::connect(&db_url).await?)
}

/// Initialize database connection pool
///
/// Creates the database file and the required tables if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = open_database_pool(db_path).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Ledger required tables that are absent, then create them
///
/// Returns the tables that were missing.
pub async fn prepare_schema(pool: &SqlitePool, ledger: &mut ErrorLedger) -> Result<Vec<String>> {
    let missing = missing_tables(pool).await?;
    for table in &missing {
        ledger.record(DATABASE_SCOPE, table, StorageFault::MissingTable);
    }
    init_tables(pool).await?;
    Ok(missing)
}

/// Single-connection in-memory database with the schema applied
///
/// Used for dry runs, where nothing may touch the database file.
pub async fn init_in_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create testers, projects and issues tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS testers (
            tester_id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            surname TEXT NOT NULL,
            company TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            project_id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_key TEXT UNIQUE NOT NULL,
            provider TEXT,
            device_type TEXT,
            product_id TEXT,
            project_name TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // test_key is not UNIQUE; duplicates are detected and reported
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issues (
            test_id INTEGER PRIMARY KEY AUTOINCREMENT,
            test_key TEXT NOT NULL,
            test_type TEXT NOT NULL,
            dist_channel TEXT NOT NULL,
            tester_id INTEGER REFERENCES testers(tester_id),
            project_id INTEGER REFERENCES projects(project_id),
            time_hours REAL NOT NULL DEFAULT 0.0,
            software_version TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_issues_test_key ON issues(test_key)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (testers, projects, issues)");

    Ok(())
}

/// Required tables absent from the database
pub async fn missing_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let found: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;

    let missing: Vec<String> = REQUIRED_TABLES
        .iter()
        .filter(|table| !found.iter().any(|name| name == *table))
        .map(|table| table.to_string())
        .collect();

    if missing.is_empty() {
        tracing::debug!("All necessary tables present");
    } else {
        tracing::error!("Tables {:?} not present!", missing);
    }

    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_has_all_tables() {
        let pool = init_in_memory_pool().await.unwrap();
        assert!(missing_tables(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tables_reported() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE testers (tester_id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(missing_tables(&pool).await.unwrap(), vec!["projects", "issues"]);
    }

    #[tokio::test]
    async fn test_init_tables_is_idempotent() {
        let pool = init_in_memory_pool().await.unwrap();
        init_tables(&pool).await.unwrap();
        assert!(missing_tables(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_schema_ledgers_missing_tables_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let pool = open_database_pool(&dir.path().join("qa.db")).await.unwrap();
        let mut ledger = ErrorLedger::new();

        let missing = prepare_schema(&pool, &mut ledger).await.unwrap();
        assert_eq!(missing, vec!["testers", "projects", "issues"]);
        assert!(ledger.has_code("issues", StorageFault::MissingTable));
        assert_eq!(ledger.len(), 3);

        let mut second = ErrorLedger::new();
        assert!(prepare_schema(&pool, &mut second).await.unwrap().is_empty());
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_file_database_created() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("qa.db");

        let pool = init_database_pool(&path).await.unwrap();
        assert!(path.exists());
        assert!(missing_tables(&pool).await.unwrap().is_empty());
    }
}
