//! Testers and projects tables
//!
//! Both are populated from configuration at startup; the sync only reads
//! them to resolve foreign keys.

use qa_sync_common::config::{AppConfig, TesterEntry};
use qa_sync_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Insert configured testers that are not stored yet
///
/// Returns the number of newly inserted rows. Fails if a configured tester
/// is still absent afterwards.
pub async fn populate_testers(
    pool: &SqlitePool,
    testers: &BTreeMap<String, TesterEntry>,
) -> Result<usize> {
    let mut inserted = 0;

    for (username, tester) in testers {
        let result = sqlx::query(
            r#"
            INSERT INTO testers (username, name, surname, company)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(username) DO NOTHING
            "#,
        )
        .bind(username)
        .bind(&tester.name)
        .bind(&tester.surname)
        .bind(&tester.company)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!("Tester {} added", username);
            inserted += 1;
        }
    }

    let stored: Vec<String> = sqlx::query_scalar("SELECT username FROM testers")
        .fetch_all(pool)
        .await?;
    let missing: Vec<&str> = testers
        .keys()
        .filter(|username| !stored.contains(username))
        .map(String::as_str)
        .collect();

    if !missing.is_empty() {
        error!("Testers still not added: {:?}", missing);
        return Err(Error::Internal(format!(
            "Testers still not added: {}",
            missing.join(", ")
        )));
    }

    info!("Testers table populated ({} new)", inserted);
    Ok(inserted)
}

/// Insert configured projects that are not stored yet
///
/// The provider column holds the developer configured for the project.
pub async fn populate_projects(pool: &SqlitePool, config: &AppConfig) -> Result<usize> {
    let mut inserted = 0;

    for (key, project) in &config.projects {
        let result = sqlx::query(
            r#"
            INSERT INTO projects (project_key, provider, device_type, product_id, project_name)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(project_key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(config.developer_for(key))
        .bind(&project.device_type)
        .bind(&project.product_id)
        .bind(&project.name)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!("Project {} added", key);
            inserted += 1;
        }
    }

    info!("Projects table populated ({} new)", inserted);
    Ok(inserted)
}

/// Tester id by tracker display name ("Name Surname") or username
pub async fn find_tester_id(pool: &SqlitePool, display_name: &str) -> Result<Option<i64>> {
    let id: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT tester_id FROM testers
        WHERE (name || ' ' || surname) = ? OR username = ?
        ORDER BY tester_id
        LIMIT 1
        "#,
    )
    .bind(display_name)
    .bind(display_name)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

pub async fn find_project_id(pool: &SqlitePool, project_key: &str) -> Result<Option<i64>> {
    let id: Option<i64> =
        sqlx::query_scalar("SELECT project_id FROM projects WHERE project_key = ?")
            .bind(project_key)
            .fetch_optional(pool)
            .await?;

    Ok(id)
}

/// Project id, inserting a minimal row for projects missing from the table
pub async fn ensure_project(
    pool: &SqlitePool,
    project_key: &str,
    provider: Option<&str>,
    project_name: Option<&str>,
) -> Result<i64> {
    if let Some(id) = find_project_id(pool, project_key).await? {
        return Ok(id);
    }

    let result = sqlx::query(
        "INSERT INTO projects (project_key, provider, project_name) VALUES (?, ?, ?)",
    )
    .bind(project_key)
    .bind(provider)
    .bind(project_name)
    .execute(pool)
    .await?;

    debug!("Project {} registered on first sync", project_key);
    Ok(result.last_insert_rowid())
}
