//! Jira REST API client
//!
//! Implements [`TrackerGateway`] over Jira's REST API v2 with basic auth
//! (account email + API token), a per-request timeout and a client-side
//! rate limit.

use super::{
    FieldDescriptor, LinkDescriptor, LinkDirection, RawIssue, RawIssueDetail, TrackerError,
    TrackerGateway,
};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use qa_sync_common::config::TrackerCredentials;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

const API_PREFIX: &str = "/rest/api/2";
const USER_AGENT: &str = concat!("qa-sync/", env!("CARGO_PKG_VERSION"));
/// Jira caps `maxResults` per search page
const SEARCH_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct WireIssue {
    key: String,
    #[serde(default)]
    fields: WireFields,
}

#[derive(Debug, Default, Deserialize)]
struct WireFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    issuetype: Option<WireNamed>,
    #[serde(default)]
    parent: Option<WireKeyRef>,
    #[serde(default)]
    aggregatetimespent: Option<u64>,
    #[serde(default)]
    issuelinks: Vec<WireLink>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct WireNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireKeyRef {
    key: String,
}

#[derive(Debug, Deserialize)]
struct WireLink {
    #[serde(rename = "type")]
    link_type: Option<WireNamed>,
    #[serde(rename = "inwardIssue")]
    inward_issue: Option<WireLinkedIssue>,
    #[serde(rename = "outwardIssue")]
    outward_issue: Option<WireLinkedIssue>,
}

#[derive(Debug, Deserialize)]
struct WireLinkedIssue {
    key: String,
    #[serde(default)]
    fields: WireLinkedFields,
}

#[derive(Debug, Default, Deserialize)]
struct WireLinkedFields {
    issuetype: Option<WireNamed>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSearchPage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<WireIssue>,
}

#[derive(Debug, Deserialize)]
struct WireField {
    id: String,
    name: String,
}

impl WireIssue {
    fn into_detail(self) -> RawIssueDetail {
        let WireFields {
            summary,
            issuetype,
            parent,
            aggregatetimespent,
            issuelinks: _,
            extra,
        } = self.fields;

        RawIssueDetail {
            key: self.key,
            summary: summary.unwrap_or_default(),
            issue_type: issuetype.map(|t| t.name),
            parent: parent.map(|p| p.key),
            aggregate_time_spent: aggregatetimespent,
            fields: extra,
        }
    }

    fn into_raw(self) -> RawIssue {
        RawIssue {
            key: self.key,
            summary: self.fields.summary.unwrap_or_default(),
            aggregate_time_spent: self.fields.aggregatetimespent,
            parent: self.fields.parent.map(|p| p.key),
        }
    }

    fn into_links(self) -> Vec<LinkDescriptor> {
        self.fields
            .issuelinks
            .into_iter()
            .filter_map(WireLink::into_descriptor)
            .collect()
    }
}

impl WireLink {
    fn into_descriptor(self) -> Option<LinkDescriptor> {
        let link_type = self.link_type.map(|t| t.name).unwrap_or_default();
        let (direction, issue) = match (self.inward_issue, self.outward_issue) {
            (Some(issue), _) => (LinkDirection::Inward, issue),
            (None, Some(issue)) => (LinkDirection::Outward, issue),
            (None, None) => return None,
        };

        Some(LinkDescriptor {
            direction,
            link_type,
            issue_key: issue.key,
            issue_type: issue.fields.issuetype.map(|t| t.name).unwrap_or_default(),
        })
    }
}

/// Map a non-success HTTP status to a tracker error
fn status_error(status: StatusCode, context: &str, body: String) -> TrackerError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TrackerError::Unauthorized(format!("{} ({})", context, status))
        }
        StatusCode::NOT_FOUND => TrackerError::NotFound(context.to_string()),
        _ => TrackerError::Api(status.as_u16(), body),
    }
}

/// Jira API client
pub struct JiraClient {
    http_client: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl JiraClient {
    pub fn new(
        credentials: &TrackerCredentials,
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, TrackerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::Network(e.to_string()))?;

        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            http_client,
            base_url: credentials.server.trim_end_matches('/').to_string(),
            email: credentials.email.clone(),
            api_token: credentials.api_token.clone(),
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T, TrackerError> {
        self.rate_limiter.until_ready().await;

        let url = self.url(path);
        debug!(url = %url, "Querying tracker API");

        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.email, Some(&self.api_token))
            .query(query)
            .send()
            .await
            .map_err(|e| TrackerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, context, body));
        }

        response
            .json()
            .await
            .map_err(|e| TrackerError::Parse(format!("{}: {}", context, e)))
    }
}

#[async_trait]
impl TrackerGateway for JiraClient {
    async fn verify_session(&self) -> Result<(), TrackerError> {
        let _: Value = self.get_json("/myself", &[], "session check").await?;
        debug!("Tracker session established");
        Ok(())
    }

    async fn fetch_issue(&self, key: &str) -> Result<RawIssueDetail, TrackerError> {
        let issue: WireIssue = self
            .get_json(&format!("/issue/{}", key), &[], &format!("issue {}", key))
            .await?;
        Ok(issue.into_detail())
    }

    async fn fetch_linked_issues(&self, epic_key: &str) -> Result<Vec<LinkDescriptor>, TrackerError> {
        let issue: WireIssue = self
            .get_json(
                &format!("/issue/{}", epic_key),
                &[("fields", "issuelinks".to_string())],
                &format!("links of {}", epic_key),
            )
            .await?;
        Ok(issue.into_links())
    }

    async fn search_issues(&self, jql: &str, limit: usize) -> Result<Vec<RawIssue>, TrackerError> {
        let mut issues = Vec::new();

        while issues.len() < limit {
            let page_size = SEARCH_PAGE_SIZE.min(limit - issues.len());
            let page: WireSearchPage = self
                .get_json(
                    "/search",
                    &[
                        ("jql", jql.to_string()),
                        ("startAt", issues.len().to_string()),
                        ("maxResults", page_size.to_string()),
                        ("fields", "summary,parent,aggregatetimespent".to_string()),
                    ],
                    "issue search",
                )
                .await?;

            let received = page.issues.len();
            issues.extend(page.issues.into_iter().map(WireIssue::into_raw));

            if received == 0 || issues.len() >= page.total {
                break;
            }
        }

        issues.truncate(limit);
        Ok(issues)
    }

    async fn fetch_field_catalog(&self) -> Result<Vec<FieldDescriptor>, TrackerError> {
        let fields: Vec<WireField> = self.get_json("/field", &[], "field catalog").await?;
        Ok(fields
            .into_iter()
            .map(|f| FieldDescriptor::new(f.id, f.name))
            .collect())
    }
}
