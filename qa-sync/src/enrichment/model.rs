//! Enriched issue model
//!
//! Derived attributes keep the reason they could not be resolved. They are
//! flattened to the [`UNKNOWN`] sentinel only when written out.

use serde::Serialize;

/// Sentinel written for unresolved attributes
pub const UNKNOWN: &str = "Unknown";

/// Why a derived attribute could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unresolved {
    /// Issue has no resolvable parent epic
    ParentMissing,
    /// Parent epic could not be fetched
    EpicUnavailable,
    /// Parent epic summary has no leading token
    EmptyEpicSummary,
    /// Parent epic has no inward SuperEpic link
    NoSuperEpicLink,
    /// Link list or SuperEpic could not be fetched
    SuperEpicUnavailable,
    /// Approvers field is not in the field catalog
    FieldNotConfigured,
    /// Approvers field absent, empty or malformed on the issue
    FieldEmpty,
    /// Issue detail could not be fetched
    IssueUnavailable,
}

/// Result of deriving one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derived {
    Resolved(String),
    Unresolved(Unresolved),
}

impl Derived {
    pub fn value(&self) -> Option<&str> {
        match self {
            Derived::Resolved(value) => Some(value),
            Derived::Unresolved(_) => None,
        }
    }

    pub fn reason(&self) -> Option<Unresolved> {
        match self {
            Derived::Resolved(_) => None,
            Derived::Unresolved(reason) => Some(*reason),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Derived::Resolved(_))
    }

    /// Value, or the `"Unknown"` sentinel
    pub fn or_unknown(&self) -> &str {
        self.value().unwrap_or(UNKNOWN)
    }
}

impl Serialize for Derived {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.or_unknown())
    }
}

/// Issue with derived attributes, one per search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedIssue {
    pub key: String,
    /// Issue summary, used as the test type label
    pub test_type: String,
    pub channel: Derived,
    pub tester: Derived,
    /// Hours spent, rounded to one decimal
    pub elapsed_hours: f64,
    pub software_version: Derived,
    #[serde(skip)]
    pub parent_epic: Option<String>,
}

impl EnrichedIssue {
    pub fn channel_or_unknown(&self) -> &str {
        self.channel.or_unknown()
    }

    pub fn tester_or_unknown(&self) -> &str {
        self.tester.or_unknown()
    }

    pub fn version_or_unknown(&self) -> &str {
        self.software_version.or_unknown()
    }
}

/// Seconds to hours, rounded half-to-even to one decimal; `None` counts as zero
pub fn hours_from_seconds(seconds: Option<u64>) -> f64 {
    let hours = seconds.unwrap_or(0) as f64 / 3600.0;
    (hours * 10.0).round_ties_even() / 10.0
}

/// First whitespace-delimited token of an epic summary
pub fn version_from_summary(summary: &str) -> Option<String> {
    summary.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_rounding() {
        assert_eq!(hours_from_seconds(Some(7200)), 2.0);
        assert_eq!(hours_from_seconds(Some(5400)), 1.5);
        assert_eq!(hours_from_seconds(Some(1000)), 0.3);
        assert_eq!(hours_from_seconds(Some(7000)), 1.9);
        assert_eq!(hours_from_seconds(Some(0)), 0.0);
        assert_eq!(hours_from_seconds(None), 0.0);
    }

    #[test]
    fn test_quarter_hours_round_half_to_even() {
        assert_eq!(hours_from_seconds(Some(900)), 0.2);
        assert_eq!(hours_from_seconds(Some(2700)), 0.8);
        assert_eq!(hours_from_seconds(Some(4500)), 1.2);
        assert_eq!(hours_from_seconds(Some(8100)), 2.2);
        assert_eq!(hours_from_seconds(Some(6300)), 1.8);
    }

    #[test]
    fn test_version_from_summary() {
        assert_eq!(version_from_summary("2.4.1 Release candidate").as_deref(), Some("2.4.1"));
        assert_eq!(version_from_summary("  \t10.0\nnotes").as_deref(), Some("10.0"));
        assert_eq!(version_from_summary("   "), None);
        assert_eq!(version_from_summary(""), None);
    }

    #[test]
    fn test_unresolved_flattens_to_sentinel() {
        let derived = Derived::Unresolved(Unresolved::ParentMissing);
        assert_eq!(derived.or_unknown(), UNKNOWN);
        assert_eq!(derived.reason(), Some(Unresolved::ParentMissing));
        assert!(!derived.is_resolved());

        let json = serde_json::to_value(&derived).unwrap();
        assert_eq!(json, serde_json::json!("Unknown"));
    }

    #[test]
    fn test_resolved_serializes_value() {
        let issue = EnrichedIssue {
            key: "T-1".to_string(),
            test_type: "Smoke".to_string(),
            channel: Derived::Resolved("Retail".to_string()),
            tester: Derived::Unresolved(Unresolved::FieldEmpty),
            elapsed_hours: 1.5,
            software_version: Derived::Resolved("3.0".to_string()),
            parent_epic: Some("EPIC-1".to_string()),
        };

        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["channel"], "Retail");
        assert_eq!(json["tester"], "Unknown");
        assert_eq!(json["software_version"], "3.0");
        assert!(json.get("parent_epic").is_none());
    }
}
