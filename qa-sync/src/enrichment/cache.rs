//! Ancestor cache
//!
//! Run-scoped memo of attributes derived from an epic, so issues sharing a
//! parent do not trigger repeated tracker calls. Fields are filled lazily
//! and independently. No eviction: a run is one bounded batch.

use std::collections::HashMap;

/// Attributes derived from one epic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncestorEntry {
    pub channel_type: Option<String>,
    pub soft_version: Option<String>,
}

/// Epic key -> derived attributes
#[derive(Debug, Default)]
pub struct AncestorCache {
    entries: HashMap<String, AncestorEntry>,
}

impl AncestorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, epic_key: &str) -> Option<&AncestorEntry> {
        self.entries.get(epic_key)
    }

    /// Create an empty entry if absent
    pub fn ensure(&mut self, epic_key: &str) -> &mut AncestorEntry {
        self.entries.entry(epic_key.to_string()).or_default()
    }

    pub fn set_channel(&mut self, epic_key: &str, channel: impl Into<String>) {
        self.ensure(epic_key).channel_type = Some(channel.into());
    }

    pub fn set_version(&mut self, epic_key: &str, version: impl Into<String>) {
        self.ensure(epic_key).soft_version = Some(version.into());
    }

    pub fn channel(&self, epic_key: &str) -> Option<&str> {
        self.get(epic_key).and_then(|e| e.channel_type.as_deref())
    }

    pub fn version(&self, epic_key: &str) -> Option<&str> {
        self.get(epic_key).and_then(|e| e.soft_version.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
