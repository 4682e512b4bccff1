//! Enrichment engine
//!
//! Turns a raw search result into an [`EnrichedIssue`]:
//! 1. parent resolution (issue detail -> parent epic key)
//! 2. software version (first token of the epic summary, cached per epic)
//! 3. distribution channel (first inward SuperEpic link, cached per epic)
//! 4. tester (first user of the Approvers field)
//! 5. elapsed time
//!
//! The three derivation branches are independent. Missing data never fails
//! the call: each failure becomes an `Unresolved` value plus a ledger entry.

use super::cache::AncestorCache;
use super::fields::{FieldNameMap, UserListField, APPROVERS_FIELD};
use super::ledger::{EnrichmentFault, ErrorLedger, UNKNOWN_SCOPE};
use super::model::{hours_from_seconds, version_from_summary, Derived, EnrichedIssue, Unresolved};
use crate::tracker::{LinkDirection, RawIssue, RawIssueDetail, TrackerGateway};
use tracing::{debug, error, warn};

/// Issue type whose summary names the distribution channel
pub const SUPER_EPIC_TYPE: &str = "SuperEpic";

/// Per-run enrichment with injected cache and ledger
pub struct EnrichmentEngine<'a> {
    tracker: &'a dyn TrackerGateway,
    approvers: Option<UserListField>,
    cache: &'a mut AncestorCache,
    ledger: &'a mut ErrorLedger,
}

impl<'a> EnrichmentEngine<'a> {
    pub fn new(
        tracker: &'a dyn TrackerGateway,
        fields: &FieldNameMap,
        cache: &'a mut AncestorCache,
        ledger: &'a mut ErrorLedger,
    ) -> Self {
        let approvers = match fields.user_list(APPROVERS_FIELD) {
            Ok(field) => Some(field),
            Err(e) => {
                warn!("{}; testers will be reported as unknown", e);
                None
            }
        };

        Self {
            tracker,
            approvers,
            cache,
            ledger,
        }
    }

    /// Enrich one issue, updating the cache and ledger
    pub async fn enrich(&mut self, raw: &RawIssue) -> EnrichedIssue {
        let key = raw.key.as_str();
        debug!(issue = %key, "Starting enrichment");

        let detail = match self.tracker.fetch_issue(key).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                warn!(issue = %key, "Issue detail lookup failed: {}", e);
                None
            }
        };

        let parent = detail.as_ref().and_then(|d| d.parent.clone());
        match &parent {
            Some(epic) => {
                debug!(issue = %key, epic = %epic, "Parent resolved");
                self.cache.ensure(epic);
            }
            None => {
                error!(issue = %key, "No parent epic found");
                self.ledger
                    .record(UNKNOWN_SCOPE, key, EnrichmentFault::ParentLookupFailed);
            }
        }

        let software_version = self.derive_version(key, parent.as_deref()).await;
        let channel = self.derive_channel(key, parent.as_deref()).await;
        let scope = parent.as_deref().unwrap_or(UNKNOWN_SCOPE);
        let tester = self.derive_tester(key, scope, detail.as_ref());
        let elapsed_hours = hours_from_seconds(raw.aggregate_time_spent);

        debug!(
            issue = %key,
            channel = %channel.or_unknown(),
            tester = %tester.or_unknown(),
            version = %software_version.or_unknown(),
            hours = elapsed_hours,
            "Issue enriched"
        );

        EnrichedIssue {
            key: raw.key.clone(),
            test_type: raw.summary.clone(),
            channel,
            tester,
            elapsed_hours,
            software_version,
            parent_epic: parent,
        }
    }

    async fn derive_version(&mut self, key: &str, parent: Option<&str>) -> Derived {
        let Some(epic) = parent else {
            return Derived::Unresolved(Unresolved::ParentMissing);
        };

        if let Some(version) = self.cache.version(epic) {
            debug!(issue = %key, epic = %epic, "Version cache hit");
            return Derived::Resolved(version.to_string());
        }

        let epic_detail = match self.tracker.fetch_issue(epic).await {
            Ok(detail) => detail,
            Err(e) => {
                error!(issue = %key, epic = %epic, "Parent epic lookup failed: {}", e);
                self.ledger
                    .record(epic, key, EnrichmentFault::ParentLookupFailed);
                return Derived::Unresolved(Unresolved::EpicUnavailable);
            }
        };

        match version_from_summary(&epic_detail.summary) {
            Some(version) => {
                debug!(epic = %epic, version = %version, "Version derived from epic summary");
                self.cache.set_version(epic, version.clone());
                Derived::Resolved(version)
            }
            None => {
                error!(issue = %key, epic = %epic, "Epic summary carries no version");
                self.ledger.record(epic, key, EnrichmentFault::VersionNotFound);
                Derived::Unresolved(Unresolved::EmptyEpicSummary)
            }
        }
    }

    async fn derive_channel(&mut self, key: &str, parent: Option<&str>) -> Derived {
        let Some(epic) = parent else {
            return Derived::Unresolved(Unresolved::ParentMissing);
        };

        if let Some(channel) = self.cache.channel(epic) {
            debug!(issue = %key, epic = %epic, "Channel cache hit");
            return Derived::Resolved(channel.to_string());
        }

        debug!(epic = %epic, "Iterating over linked issues");
        let links = match self.tracker.fetch_linked_issues(epic).await {
            Ok(links) => links,
            Err(e) => {
                error!(issue = %key, epic = %epic, "Linked issue lookup failed: {}", e);
                self.ledger
                    .record(epic, key, EnrichmentFault::SuperEpicLookupFailed);
                return Derived::Unresolved(Unresolved::SuperEpicUnavailable);
            }
        };

        let super_epic = links
            .iter()
            .find(|link| link.direction == LinkDirection::Inward && link.issue_type == SUPER_EPIC_TYPE);

        let Some(link) = super_epic else {
            error!(
                issue = %key,
                epic = %epic,
                "Can't find distribution channel: no inward SuperEpic link"
            );
            self.ledger.record(epic, key, EnrichmentFault::NoSuperEpicLink);
            return Derived::Unresolved(Unresolved::NoSuperEpicLink);
        };

        debug!(epic = %epic, super_epic = %link.issue_key, "Inward linked issue is a SuperEpic");
        match self.tracker.fetch_issue(&link.issue_key).await {
            Ok(super_epic) => {
                self.cache.set_channel(epic, super_epic.summary.clone());
                Derived::Resolved(super_epic.summary)
            }
            Err(e) => {
                error!(
                    issue = %key,
                    super_epic = %link.issue_key,
                    "SuperEpic lookup failed: {}", e
                );
                self.ledger
                    .record(epic, key, EnrichmentFault::SuperEpicLookupFailed);
                Derived::Unresolved(Unresolved::SuperEpicUnavailable)
            }
        }
    }

    fn derive_tester(&mut self, key: &str, scope: &str, detail: Option<&RawIssueDetail>) -> Derived {
        let reason = match (&self.approvers, detail) {
            (None, _) => Unresolved::FieldNotConfigured,
            (Some(_), None) => Unresolved::IssueUnavailable,
            (Some(field), Some(detail)) => match field.first_display_name(detail) {
                Some(tester) => {
                    debug!(issue = %key, tester = %tester, "Tester found");
                    return Derived::Resolved(tester);
                }
                None => Unresolved::FieldEmpty,
            },
        };

        error!(issue = %key, "No tester name found in Approvers ({:?})", reason);
        self.ledger.record(scope, key, EnrichmentFault::TesterNotFound);
        Derived::Unresolved(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::ledger::LedgerCode;
    use crate::tracker::memory::TrackerCall;
    use crate::tracker::{FieldDescriptor, InMemoryTracker, LinkDescriptor};
    use serde_json::json;

    const APPROVERS_ID: &str = "customfield_10050";

    fn fields() -> FieldNameMap {
        FieldNameMap::from_catalog(vec![FieldDescriptor::new(APPROVERS_ID, APPROVERS_FIELD)])
    }

    fn test_issue(key: &str, parent: Option<&str>) -> RawIssueDetail {
        let detail = RawIssueDetail::new(key, "Regression")
            .with_type("Test Type")
            .with_field(APPROVERS_ID, json!([{ "displayName": "Jane Doe" }]));
        match parent {
            Some(parent) => detail.with_parent(parent),
            None => detail,
        }
    }

    #[tokio::test]
    async fn test_epic_fetch_failure_is_ledgered_under_epic() {
        let tracker = InMemoryTracker::new()
            .with_issue(test_issue("T-1", Some("EPIC-1")))
            .failing_issue("EPIC-1");
        let mut cache = AncestorCache::new();
        let mut ledger = ErrorLedger::new();
        let fields = fields();

        let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
        let issue = engine.enrich(&RawIssue::new("T-1", "Regression")).await;

        assert_eq!(
            issue.software_version,
            Derived::Unresolved(Unresolved::EpicUnavailable)
        );
        assert_eq!(
            issue.channel,
            Derived::Unresolved(Unresolved::SuperEpicUnavailable)
        );
        assert_eq!(issue.tester, Derived::Resolved("Jane Doe".to_string()));
        assert_eq!(
            ledger.codes_for("EPIC-1", "T-1"),
            &[
                LedgerCode::Enrichment(EnrichmentFault::ParentLookupFailed),
                LedgerCode::Enrichment(EnrichmentFault::SuperEpicLookupFailed),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_epic_summary_records_version_not_found() {
        let tracker = InMemoryTracker::new()
            .with_issue(test_issue("T-1", Some("EPIC-1")))
            .with_issue(RawIssueDetail::new("EPIC-1", "   "))
            .with_issue(RawIssueDetail::new("SE-1", "Retail"))
            .with_links("EPIC-1", vec![LinkDescriptor::inward("SE-1", SUPER_EPIC_TYPE)]);
        let mut cache = AncestorCache::new();
        let mut ledger = ErrorLedger::new();
        let fields = fields();

        let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
        let issue = engine.enrich(&RawIssue::new("T-1", "Regression")).await;

        assert_eq!(issue.version_or_unknown(), "Unknown");
        assert_eq!(issue.channel_or_unknown(), "Retail");
        assert!(ledger.has_code("T-1", EnrichmentFault::VersionNotFound));
    }

    #[tokio::test]
    async fn test_outward_super_epic_link_ignored() {
        let tracker = InMemoryTracker::new()
            .with_issue(test_issue("T-1", Some("EPIC-1")))
            .with_issue(RawIssueDetail::new("EPIC-1", "1.0 Launch"))
            .with_issue(RawIssueDetail::new("SE-9", "Wrong"))
            .with_issue(RawIssueDetail::new("SE-1", "Operator"))
            .with_links(
                "EPIC-1",
                vec![
                    LinkDescriptor::outward("SE-9", SUPER_EPIC_TYPE),
                    LinkDescriptor::inward("X-1", "Story"),
                    LinkDescriptor::inward("SE-1", SUPER_EPIC_TYPE),
                ],
            );
        let mut cache = AncestorCache::new();
        let mut ledger = ErrorLedger::new();
        let fields = fields();

        let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
        let issue = engine.enrich(&RawIssue::new("T-1", "Regression")).await;

        assert_eq!(issue.channel_or_unknown(), "Operator");
        assert_eq!(tracker.calls(TrackerCall::FetchIssue, "SE-9"), 0);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_first_matching_super_epic_wins() {
        let tracker = InMemoryTracker::new()
            .with_issue(test_issue("T-1", Some("EPIC-1")))
            .with_issue(RawIssueDetail::new("EPIC-1", "1.0"))
            .with_issue(RawIssueDetail::new("SE-1", "First"))
            .with_issue(RawIssueDetail::new("SE-2", "Second"))
            .with_links(
                "EPIC-1",
                vec![
                    LinkDescriptor::inward("SE-1", SUPER_EPIC_TYPE),
                    LinkDescriptor::inward("SE-2", SUPER_EPIC_TYPE),
                ],
            );
        let mut cache = AncestorCache::new();
        let mut ledger = ErrorLedger::new();
        let fields = fields();

        let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
        let issue = engine.enrich(&RawIssue::new("T-1", "Regression")).await;

        assert_eq!(issue.channel_or_unknown(), "First");
        assert_eq!(tracker.calls(TrackerCall::FetchIssue, "SE-2"), 0);
        assert_eq!(cache.channel("EPIC-1"), Some("First"));
    }

    #[tokio::test]
    async fn test_missing_approvers_field_in_catalog() {
        let tracker = InMemoryTracker::new()
            .with_issue(test_issue("T-1", Some("EPIC-1")))
            .with_issue(RawIssueDetail::new("EPIC-1", "1.0"));
        let mut cache = AncestorCache::new();
        cache.set_channel("EPIC-1", "Retail");
        let mut ledger = ErrorLedger::new();
        let fields = FieldNameMap::default();

        let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
        let issue = engine.enrich(&RawIssue::new("T-1", "Regression")).await;

        assert_eq!(
            issue.tester,
            Derived::Unresolved(Unresolved::FieldNotConfigured)
        );
        assert_eq!(
            ledger.codes_for("EPIC-1", "T-1"),
            &[LedgerCode::Enrichment(EnrichmentFault::TesterNotFound)]
        );
    }

    #[tokio::test]
    async fn test_issue_detail_failure_degrades_every_branch() {
        let tracker = InMemoryTracker::new().failing_issue("T-1");
        let mut cache = AncestorCache::new();
        let mut ledger = ErrorLedger::new();
        let fields = fields();

        let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
        let issue = engine
            .enrich(&RawIssue::new("T-1", "Regression").with_time_spent(1800))
            .await;

        assert_eq!(issue.channel_or_unknown(), "Unknown");
        assert_eq!(issue.version_or_unknown(), "Unknown");
        assert_eq!(issue.tester, Derived::Unresolved(Unresolved::IssueUnavailable));
        assert_eq!(issue.elapsed_hours, 0.5);
        assert_eq!(
            ledger.codes_for(UNKNOWN_SCOPE, "T-1"),
            &[
                LedgerCode::Enrichment(EnrichmentFault::ParentLookupFailed),
                LedgerCode::Enrichment(EnrichmentFault::TesterNotFound),
            ]
        );
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_missing_super_epic_issue_keeps_version() {
        let tracker = InMemoryTracker::new()
            .with_issue(test_issue("T-1", Some("EPIC-1")))
            .with_issue(RawIssueDetail::new("EPIC-1", "4.2 Spring"))
            .with_links("EPIC-1", vec![LinkDescriptor::inward("SE-1", SUPER_EPIC_TYPE)]);
        let mut cache = AncestorCache::new();
        let mut ledger = ErrorLedger::new();
        let fields = fields();

        let mut engine = EnrichmentEngine::new(&tracker, &fields, &mut cache, &mut ledger);
        let issue = engine.enrich(&RawIssue::new("T-1", "Regression")).await;

        assert_eq!(issue.version_or_unknown(), "4.2");
        assert_eq!(
            issue.channel,
            Derived::Unresolved(Unresolved::SuperEpicUnavailable)
        );
        assert_eq!(cache.version("EPIC-1"), Some("4.2"));
        assert_eq!(cache.channel("EPIC-1"), None);
        assert!(ledger.has_code("T-1", EnrichmentFault::SuperEpicLookupFailed));
    }
}
