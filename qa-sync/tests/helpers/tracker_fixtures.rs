//! Tracker fixtures
//!
//! Three epics:
//! - EPIC-5 "3.2.0 Autumn release", inward SuperEpic SE-1 "ChannelA"
//! - EPIC-6 "1.1 Hotfix", no inward SuperEpic link
//! - T-300 has no parent at all

use qa_sync::enrichment::{APPROVERS_FIELD, SUPER_EPIC_TYPE};
use qa_sync::tracker::{FieldDescriptor, InMemoryTracker, LinkDescriptor, RawIssue, RawIssueDetail};
use qa_sync_common::config::AppConfig;
use serde_json::json;

pub const APPROVERS_ID: &str = "customfield_10050";

/// Test issue detail carrying one approver
pub fn test_issue(key: &str, parent: Option<&str>, approver: &str) -> RawIssueDetail {
    let detail = RawIssueDetail::new(key, "Regression")
        .with_type("Test Type")
        .with_field(APPROVERS_ID, json!([{ "displayName": approver }]));
    match parent {
        Some(parent) => detail.with_parent(parent),
        None => detail,
    }
}

/// Tracker serving T-100, T-101 (both under EPIC-5), T-200 and T-300
pub fn fixture_tracker() -> InMemoryTracker {
    InMemoryTracker::new()
        .with_field(FieldDescriptor::new("summary", "Summary"))
        .with_field(FieldDescriptor::new(APPROVERS_ID, APPROVERS_FIELD))
        .with_issue(test_issue("T-100", Some("EPIC-5"), "Jane Doe"))
        .with_issue(test_issue("T-101", Some("EPIC-5"), "Jane Doe"))
        .with_issue(test_issue("T-200", Some("EPIC-6"), "John Roe"))
        .with_issue(test_issue("T-300", None, "Jane Doe"))
        .with_issue(RawIssueDetail::new("EPIC-5", "3.2.0 Autumn release").with_type("Epic"))
        .with_issue(RawIssueDetail::new("EPIC-6", "1.1 Hotfix").with_type("Epic"))
        .with_issue(RawIssueDetail::new("SE-1", "ChannelA").with_type(SUPER_EPIC_TYPE))
        .with_issue(RawIssueDetail::new("SE-2", "Outbound").with_type(SUPER_EPIC_TYPE))
        .with_links("EPIC-5", vec![LinkDescriptor::inward("SE-1", SUPER_EPIC_TYPE)])
        .with_links(
            "EPIC-6",
            vec![
                LinkDescriptor::inward("X-9", "Story"),
                LinkDescriptor::outward("SE-2", SUPER_EPIC_TYPE),
            ],
        )
        .with_search_result(RawIssue::new("T-100", "Regression").with_time_spent(7200))
        .with_search_result(RawIssue::new("T-101", "Smoke").with_time_spent(5400))
        .with_search_result(RawIssue::new("T-200", "Regression").with_time_spent(1000))
        .with_search_result(RawIssue::new("T-300", "Exploratory"))
}

/// Config with project APP, its developer and tester jdoe (Jane Doe)
pub fn fixture_config() -> AppConfig {
    AppConfig::from_toml_str(
        r#"
        [tracker]
        search_limit = 500

        [projects.APP]
        name = "Mobile App"
        device_type = "phone"

        [developers]
        "Studio One" = ["APP"]

        [testers.jdoe]
        name = "Jane"
        surname = "Doe"
        company = "Acme"
        "#,
    )
    .expect("fixture config parses")
}
