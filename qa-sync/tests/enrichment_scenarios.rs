//! End-to-end enrichment scenarios against the fixture tracker
//!
//! - T-100: fully resolvable issue under EPIC-5
//! - T-200: epic without an inward SuperEpic link
//! - T-300: issue without a parent

mod helpers;

use helpers::{fixture_tracker, APPROVERS_ID};
use qa_sync::enrichment::{
    AncestorCache, Derived, EnrichmentEngine, EnrichmentFault, ErrorLedger, FieldNameMap,
    LedgerCode, Unresolved, APPROVERS_FIELD, UNKNOWN_SCOPE,
};
use qa_sync::tracker::memory::TrackerCall;
use qa_sync::tracker::{FieldDescriptor, RawIssue};

fn fields() -> FieldNameMap {
    FieldNameMap::from_catalog(vec![FieldDescriptor::new(APPROVERS_ID, APPROVERS_FIELD)])
}

#[tokio::test]
async fn test_fully_resolvable_issue() {
    let tracker = fixture_tracker();
    let fields = fields();
    let mut cache = AncestorCache::new();
    let mut ledger = ErrorLedger::new();

    let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
    let issue = engine
        .enrich(&RawIssue::new("T-100", "Regression").with_time_spent(7200))
        .await;

    assert_eq!(issue.key, "T-100");
    assert_eq!(issue.test_type, "Regression");
    assert_eq!(issue.channel, Derived::Resolved("ChannelA".to_string()));
    assert_eq!(issue.tester, Derived::Resolved("Jane Doe".to_string()));
    assert_eq!(issue.software_version, Derived::Resolved("3.2.0".to_string()));
    assert_eq!(issue.elapsed_hours, 2.0);
    assert_eq!(issue.parent_epic.as_deref(), Some("EPIC-5"));

    assert!(ledger.is_empty());
    assert_eq!(cache.channel("EPIC-5"), Some("ChannelA"));
    assert_eq!(cache.version("EPIC-5"), Some("3.2.0"));
}

#[tokio::test]
async fn test_epic_without_super_epic_link() {
    let tracker = fixture_tracker();
    let fields = fields();
    let mut cache = AncestorCache::new();
    let mut ledger = ErrorLedger::new();

    let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
    let issue = engine
        .enrich(&RawIssue::new("T-200", "Regression").with_time_spent(1000))
        .await;

    assert_eq!(issue.channel, Derived::Unresolved(Unresolved::NoSuperEpicLink));
    assert_eq!(issue.channel_or_unknown(), "Unknown");
    assert_eq!(issue.software_version, Derived::Resolved("1.1".to_string()));
    assert_eq!(issue.tester, Derived::Resolved("John Roe".to_string()));
    assert_eq!(issue.elapsed_hours, 0.3);

    assert_eq!(
        ledger.codes_for("EPIC-6", "T-200"),
        &[LedgerCode::Enrichment(EnrichmentFault::NoSuperEpicLink)]
    );
    // outward SuperEpic links are never followed
    assert_eq!(tracker.calls(TrackerCall::FetchIssue, "SE-2"), 0);
    assert_eq!(cache.channel("EPIC-6"), None);
}

#[tokio::test]
async fn test_issue_without_parent() {
    let tracker = fixture_tracker();
    let fields = fields();
    let mut cache = AncestorCache::new();
    let mut ledger = ErrorLedger::new();

    let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
    let issue = engine.enrich(&RawIssue::new("T-300", "Exploratory")).await;

    assert_eq!(issue.channel, Derived::Unresolved(Unresolved::ParentMissing));
    assert_eq!(
        issue.software_version,
        Derived::Unresolved(Unresolved::ParentMissing)
    );
    assert_eq!(issue.tester, Derived::Resolved("Jane Doe".to_string()));
    assert_eq!(issue.elapsed_hours, 0.0);
    assert_eq!(issue.parent_epic, None);

    assert_eq!(ledger.len(), 1);
    assert_eq!(
        ledger.codes_for(UNKNOWN_SCOPE, "T-300"),
        &[LedgerCode::Enrichment(EnrichmentFault::ParentLookupFailed)]
    );
    assert!(cache.is_empty());
    assert_eq!(tracker.total_calls(), 1);
}

#[tokio::test]
async fn test_version_computed_once_per_sibling_group() {
    let tracker = fixture_tracker();
    let fields = fields();
    let mut cache = AncestorCache::new();
    let mut ledger = ErrorLedger::new();

    let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
    let first = engine
        .enrich(&RawIssue::new("T-100", "Regression").with_time_spent(7200))
        .await;
    let second = engine
        .enrich(&RawIssue::new("T-101", "Smoke").with_time_spent(5400))
        .await;

    assert_eq!(first.software_version, second.software_version);
    assert_eq!(first.channel, second.channel);
    assert_eq!(second.elapsed_hours, 1.5);

    assert_eq!(tracker.calls(TrackerCall::FetchIssue, "EPIC-5"), 1);
    assert_eq!(tracker.calls(TrackerCall::FetchLinkedIssues, "EPIC-5"), 1);
    assert_eq!(tracker.calls(TrackerCall::FetchIssue, "SE-1"), 1);
    assert_eq!(tracker.calls(TrackerCall::FetchIssue, "T-101"), 1);
}

#[tokio::test]
async fn test_cached_channel_is_used_without_tracker_calls() {
    let tracker = fixture_tracker();
    let fields = fields();
    let mut cache = AncestorCache::new();
    cache.set_channel("EPIC-5", "Preloaded");
    let mut ledger = ErrorLedger::new();

    let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
    let issue = engine.enrich(&RawIssue::new("T-100", "Regression")).await;

    assert_eq!(issue.channel_or_unknown(), "Preloaded");
    assert_eq!(tracker.calls(TrackerCall::FetchLinkedIssues, "EPIC-5"), 0);
    assert_eq!(tracker.calls(TrackerCall::FetchIssue, "SE-1"), 0);
    // version was not cached, so the epic is still read
    assert_eq!(issue.version_or_unknown(), "3.2.0");
}

#[tokio::test]
async fn test_enrich_is_idempotent_with_warm_cache() {
    let tracker = fixture_tracker();
    let fields = fields();
    let mut cache = AncestorCache::new();
    let mut ledger = ErrorLedger::new();
    let raw = RawIssue::new("T-100", "Regression").with_time_spent(7200);

    let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
    let first = engine.enrich(&raw).await;
    let calls_after_first = tracker.total_calls();
    let second = engine.enrich(&raw).await;

    assert_eq!(first, second);
    assert_eq!(tracker.total_calls(), calls_after_first + 1);
    assert_eq!(cache.len(), 1);
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_repeated_failure_ledgered_once() {
    let tracker = fixture_tracker();
    let fields = fields();
    let mut cache = AncestorCache::new();
    let mut ledger = ErrorLedger::new();
    let raw = RawIssue::new("T-200", "Regression");

    let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
    engine.enrich(&raw).await;
    engine.enrich(&raw).await;

    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.total_codes(), 1);
}
