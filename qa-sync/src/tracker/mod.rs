//! Tracker gateway
//!
//! Narrow interface to the issue-tracking service. The enrichment pipeline
//! only ever talks to a [`TrackerGateway`]; [`JiraClient`] is the HTTP
//! implementation and [`InMemoryTracker`] serves fixtures and counts calls.

pub mod jira_client;
pub mod memory;

pub use jira_client::JiraClient;
pub use memory::InMemoryTracker;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Tracker client errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrackerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl TrackerError {
    /// Numeric code used in error reports
    pub fn report_code(&self) -> u16 {
        match self {
            TrackerError::Unauthorized(_) => 4201,
            TrackerError::NotFound(_) => 4202,
            _ => 4203,
        }
    }
}

/// Issue as returned by a search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawIssue {
    pub key: String,
    pub summary: String,
    /// Aggregate time spent in seconds
    pub aggregate_time_spent: Option<u64>,
    pub parent: Option<String>,
}

impl RawIssue {
    pub fn new(key: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            summary: summary.into(),
            aggregate_time_spent: None,
            parent: None,
        }
    }

    pub fn with_time_spent(mut self, seconds: u64) -> Self {
        self.aggregate_time_spent = Some(seconds);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// Full issue record including custom fields
#[derive(Debug, Clone, PartialEq)]
pub struct RawIssueDetail {
    pub key: String,
    pub summary: String,
    pub issue_type: Option<String>,
    pub parent: Option<String>,
    pub aggregate_time_spent: Option<u64>,
    /// Remaining fields keyed by tracker field id (e.g. `customfield_10050`)
    pub fields: Map<String, Value>,
}

impl RawIssueDetail {
    pub fn new(key: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            summary: summary.into(),
            issue_type: None,
            parent: None,
            aggregate_time_spent: None,
            fields: Map::new(),
        }
    }

    pub fn with_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = Some(issue_type.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_field(mut self, field_id: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field_id.into(), value);
        self
    }

    /// Raw value of a field by tracker field id
    pub fn field(&self, field_id: &str) -> Option<&Value> {
        self.fields.get(field_id).filter(|v| !v.is_null())
    }
}

/// Direction of an issue link relative to the issue it was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Inward,
    Outward,
}

/// One entry of an issue's link list
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDescriptor {
    pub direction: LinkDirection,
    /// Link type name (e.g. "Relates")
    pub link_type: String,
    pub issue_key: String,
    pub issue_type: String,
}

impl LinkDescriptor {
    pub fn inward(issue_key: impl Into<String>, issue_type: impl Into<String>) -> Self {
        Self {
            direction: LinkDirection::Inward,
            link_type: "Relates".to_string(),
            issue_key: issue_key.into(),
            issue_type: issue_type.into(),
        }
    }

    pub fn outward(issue_key: impl Into<String>, issue_type: impl Into<String>) -> Self {
        Self {
            direction: LinkDirection::Outward,
            ..Self::inward(issue_key, issue_type)
        }
    }
}

/// Entry of the tracker's field catalog
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub id: String,
    pub name: String,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Read/search access to the issue tracker
#[async_trait]
pub trait TrackerGateway: Send + Sync {
    /// Check that the configured credentials open a session
    async fn verify_session(&self) -> Result<(), TrackerError>;

    /// Fetch a single issue with all fields
    async fn fetch_issue(&self, key: &str) -> Result<RawIssueDetail, TrackerError>;

    /// Fetch the link list of an issue, in tracker order
    async fn fetch_linked_issues(&self, epic_key: &str) -> Result<Vec<LinkDescriptor>, TrackerError>;

    /// Run a JQL search returning at most `limit` issues
    async fn search_issues(&self, jql: &str, limit: usize) -> Result<Vec<RawIssue>, TrackerError>;

    /// Fetch the full field catalog
    async fn fetch_field_catalog(&self) -> Result<Vec<FieldDescriptor>, TrackerError>;
}
