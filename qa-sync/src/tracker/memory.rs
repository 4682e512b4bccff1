//! In-memory tracker backend
//!
//! Fixture-backed [`TrackerGateway`] used by tests and dry runs. Every call
//! is counted per operation and key so callers can assert how often the
//! tracker was consulted.

use super::{
    FieldDescriptor, LinkDescriptor, RawIssue, RawIssueDetail, TrackerError, TrackerGateway,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Tracker operations, used as call-count keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerCall {
    VerifySession,
    FetchIssue,
    FetchLinkedIssues,
    SearchIssues,
    FetchFieldCatalog,
}

#[derive(Default)]
struct CallLog {
    counts: HashMap<(TrackerCall, String), usize>,
    last_jql: Option<String>,
}

/// Fixture-backed tracker
#[derive(Default)]
pub struct InMemoryTracker {
    issues: HashMap<String, RawIssueDetail>,
    links: HashMap<String, Vec<LinkDescriptor>>,
    search_results: Vec<RawIssue>,
    fields: Vec<FieldDescriptor>,
    failing_issues: HashSet<String>,
    search_failure: Option<TrackerError>,
    session_failure: Option<TrackerError>,
    calls: Mutex<CallLog>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an issue served by `fetch_issue`
    pub fn with_issue(mut self, detail: RawIssueDetail) -> Self {
        self.issues.insert(detail.key.clone(), detail);
        self
    }

    /// Register the link list of an issue
    pub fn with_links(mut self, key: impl Into<String>, links: Vec<LinkDescriptor>) -> Self {
        self.links.insert(key.into(), links);
        self
    }

    /// Append a search result (search order follows insertion order)
    pub fn with_search_result(mut self, issue: RawIssue) -> Self {
        self.search_results.push(issue);
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Make `fetch_issue` and `fetch_linked_issues` fail for `key`
    pub fn failing_issue(mut self, key: impl Into<String>) -> Self {
        self.failing_issues.insert(key.into());
        self
    }

    pub fn failing_search(mut self, error: TrackerError) -> Self {
        self.search_failure = Some(error);
        self
    }

    pub fn failing_session(mut self, error: TrackerError) -> Self {
        self.session_failure = Some(error);
        self
    }

    fn record(&self, call: TrackerCall, key: &str) {
        if let Ok(mut log) = self.calls.lock() {
            *log.counts.entry((call, key.to_string())).or_insert(0) += 1;
        }
    }

    /// Number of calls of one operation for one key
    pub fn calls(&self, call: TrackerCall, key: &str) -> usize {
        self.calls
            .lock()
            .map(|log| log.counts.get(&(call, key.to_string())).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of calls of one operation across all keys
    pub fn calls_of(&self, call: TrackerCall) -> usize {
        self.calls
            .lock()
            .map(|log| {
                log.counts
                    .iter()
                    .filter(|((c, _), _)| *c == call)
                    .map(|(_, n)| *n)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Total number of calls made
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|log| log.counts.values().sum())
            .unwrap_or(0)
    }

    /// JQL of the most recent search
    pub fn last_jql(&self) -> Option<String> {
        self.calls.lock().ok().and_then(|log| log.last_jql.clone())
    }

    fn check_failing(&self, key: &str) -> Result<(), TrackerError> {
        if self.failing_issues.contains(key) {
            return Err(TrackerError::Network(format!("connection reset fetching {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackerGateway for InMemoryTracker {
    async fn verify_session(&self) -> Result<(), TrackerError> {
        self.record(TrackerCall::VerifySession, "");
        match &self.session_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn fetch_issue(&self, key: &str) -> Result<RawIssueDetail, TrackerError> {
        self.record(TrackerCall::FetchIssue, key);
        self.check_failing(key)?;
        self.issues
            .get(key)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(format!("issue {}", key)))
    }

    async fn fetch_linked_issues(&self, epic_key: &str) -> Result<Vec<LinkDescriptor>, TrackerError> {
        self.record(TrackerCall::FetchLinkedIssues, epic_key);
        self.check_failing(epic_key)?;
        if let Some(links) = self.links.get(epic_key) {
            return Ok(links.clone());
        }
        if self.issues.contains_key(epic_key) {
            return Ok(Vec::new());
        }
        Err(TrackerError::NotFound(format!("links of {}", epic_key)))
    }

    async fn search_issues(&self, jql: &str, limit: usize) -> Result<Vec<RawIssue>, TrackerError> {
        self.record(TrackerCall::SearchIssues, "");
        if let Ok(mut log) = self.calls.lock() {
            log.last_jql = Some(jql.to_string());
        }
        if let Some(err) = &self.search_failure {
            return Err(err.clone());
        }
        Ok(self.search_results.iter().take(limit).cloned().collect())
    }

    async fn fetch_field_catalog(&self) -> Result<Vec<FieldDescriptor>, TrackerError> {
        self.record(TrackerCall::FetchFieldCatalog, "");
        Ok(self.fields.clone())
    }
}
