//! Batch orchestrator
//!
//! Runs one bounded search per project and enriches every result in tracker
//! order. Issue-level problems never abort a batch; only the session check,
//! the field catalog and the search itself are fatal.

use crate::enrichment::{
    AncestorCache, EnrichedIssue, EnrichmentEngine, ErrorLedger, FieldNameMap, ProjectFault,
};
use crate::error::{SyncError, SyncResult};
use crate::store::IssueSink;
use crate::tracker::TrackerGateway;
use qa_sync_common::config::AppConfig;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Issue type searched for in every project
pub const TEST_ISSUE_TYPE: &str = "Test Type";

/// State owned by one sync run
#[derive(Debug)]
pub struct SyncRun {
    pub run_id: Uuid,
    pub cache: AncestorCache,
    pub ledger: ErrorLedger,
}

impl SyncRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cache: AncestorCache::new(),
            ledger: ErrorLedger::new(),
        }
    }
}

impl Default for SyncRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Project metadata resolved from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub key: String,
    pub developer: Option<String>,
    pub name: Option<String>,
}

impl ProjectContext {
    /// Look up developer and display name, ledgering whichever is missing
    pub fn resolve(key: &str, config: &AppConfig, ledger: &mut ErrorLedger) -> Self {
        let developer = config.developer_for(key).map(str::to_string);
        if developer.is_none() {
            error!(project = %key, "No developer found for project");
            ledger.record(key, key, ProjectFault::DeveloperNotFound);
        }

        let name = config.project_name(key).map(str::to_string);
        if name.is_none() {
            error!(project = %key, "Project name not found");
            ledger.record(key, key, ProjectFault::ProjectNameNotFound);
        }

        Self {
            key: key.to_string(),
            developer,
            name,
        }
    }
}

/// Per-project outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub project_key: String,
    pub fetched: usize,
    pub stored: usize,
}

/// JQL selecting the test issues of a project
pub fn search_jql(project_key: &str) -> String {
    format!(
        "project=\"{}\" AND issuetype = \"{}\"",
        project_key, TEST_ISSUE_TYPE
    )
}

/// Drives search, enrichment and storage over a verified tracker session
pub struct BatchOrchestrator<'a> {
    tracker: &'a dyn TrackerGateway,
    fields: FieldNameMap,
}

impl<'a> BatchOrchestrator<'a> {
    /// Verify the session and load the field catalog
    pub async fn connect(tracker: &'a dyn TrackerGateway) -> SyncResult<Self> {
        tracker.verify_session().await.map_err(|e| {
            error!("Tracker session check failed: {}", e);
            SyncError::Session(e)
        })?;
        info!("Tracker session verified");

        let catalog = tracker.fetch_field_catalog().await.map_err(|e| {
            error!("Field catalog lookup failed: {}", e);
            SyncError::FieldCatalog(e)
        })?;

        Ok(Self::from_parts(tracker, FieldNameMap::from_catalog(catalog)))
    }

    /// Build without touching the tracker
    pub fn from_parts(tracker: &'a dyn TrackerGateway, fields: FieldNameMap) -> Self {
        Self { tracker, fields }
    }

    pub fn fields(&self) -> &FieldNameMap {
        &self.fields
    }

    /// Search a project's test issues and enrich each one, in tracker order
    pub async fn run(
        &self,
        run: &mut SyncRun,
        project_key: &str,
        limit: usize,
    ) -> SyncResult<Vec<EnrichedIssue>> {
        let jql = search_jql(project_key);
        info!(run = %run.run_id, project = %project_key, limit, "Searching test issues");

        let mut raw = self
            .tracker
            .search_issues(&jql, limit)
            .await
            .map_err(|source| {
                error!(project = %project_key, "Issue search failed: {}", source);
                SyncError::BatchFetch {
                    project: project_key.to_string(),
                    source,
                }
            })?;

        if raw.len() > limit {
            warn!(
                project = %project_key,
                "Tracker returned {} issues, keeping the first {}",
                raw.len(),
                limit
            );
            raw.truncate(limit);
        }
        debug!(project = %project_key, "{} issues fetched", raw.len());

        let mut engine =
            EnrichmentEngine::new(self.tracker, &self.fields, &mut run.cache, &mut run.ledger);
        let mut enriched = Vec::with_capacity(raw.len());
        for issue in &raw {
            enriched.push(engine.enrich(issue).await);
        }

        info!(
            project = %project_key,
            issues = enriched.len(),
            ledger_entries = run.ledger.len(),
            "Project enriched"
        );
        Ok(enriched)
    }

    /// Resolve project metadata, enrich, and hand the batch to `sink`
    pub async fn sync_project(
        &self,
        run: &mut SyncRun,
        config: &AppConfig,
        sink: &dyn IssueSink,
        project_key: &str,
        limit: usize,
    ) -> SyncResult<ProjectSummary> {
        let project = ProjectContext::resolve(project_key, config, &mut run.ledger);
        let issues = self.run(run, project_key, limit).await?;
        let stored = sink.store(&project, &issues, &mut run.ledger).await?;

        Ok(ProjectSummary {
            project_key: project_key.to_string(),
            fetched: issues.len(),
            stored,
        })
    }

    /// Sync each project in turn; the first fatal error stops the run
    pub async fn sync_all(
        &self,
        run: &mut SyncRun,
        config: &AppConfig,
        sink: &dyn IssueSink,
        project_keys: &[String],
        limit: usize,
    ) -> SyncResult<Vec<ProjectSummary>> {
        let mut summaries = Vec::with_capacity(project_keys.len());
        for key in project_keys {
            summaries.push(self.sync_project(run, config, sink, key, limit).await?);
        }
        Ok(summaries)
    }
}
