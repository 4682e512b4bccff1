//! Custom field name resolution
//!
//! The tracker exposes custom fields under opaque ids (`customfield_10050`).
//! [`FieldNameMap`] is built once per session from the field catalog and
//! hands out typed accessors for the fields the pipeline reads.

use crate::tracker::{FieldDescriptor, RawIssueDetail};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Display name of the custom field listing an issue's testers
pub const APPROVERS_FIELD: &str = "Approvers";

/// Requested display name is absent from the field catalog
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Field not found in tracker catalog: {0}")]
pub struct FieldNotFoundError(pub String);

/// Display name -> field id, read-only after construction
#[derive(Debug, Clone, Default)]
pub struct FieldNameMap {
    by_name: HashMap<String, String>,
}

impl FieldNameMap {
    /// Build from the full catalog; a later duplicate name overrides an earlier one
    pub fn from_catalog(catalog: Vec<FieldDescriptor>) -> Self {
        let by_name: HashMap<String, String> =
            catalog.into_iter().map(|f| (f.name, f.id)).collect();
        debug!("Field name map built with {} entries", by_name.len());
        Self { by_name }
    }

    pub fn resolve(&self, display_name: &str) -> Result<&str, FieldNotFoundError> {
        self.by_name
            .get(display_name)
            .map(String::as_str)
            .ok_or_else(|| FieldNotFoundError(display_name.to_string()))
    }

    /// Typed accessor for a user-list field
    pub fn user_list(&self, display_name: &str) -> Result<UserListField, FieldNotFoundError> {
        self.resolve(display_name).map(|id| UserListField {
            field_id: id.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Accessor for a field holding a list of users
#[derive(Debug, Clone, PartialEq)]
pub struct UserListField {
    field_id: String,
}

impl UserListField {
    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    /// Display name of the first user in the field
    ///
    /// A single-user value (object instead of list) is accepted as well.
    pub fn first_display_name(&self, issue: &RawIssueDetail) -> Option<String> {
        let first = match issue.field(&self.field_id)? {
            Value::Array(users) => users.first()?,
            user @ Value::Object(_) => user,
            _ => return None,
        };

        first
            .get("displayName")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }
}
