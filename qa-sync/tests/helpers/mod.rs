//! Test Helper Utilities
//!
//! Shared fixtures for the qa-sync integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod tracker_fixtures;

pub use db_utils::{create_test_db, get_table_columns, has_column, seeded_store};
pub use tracker_fixtures::{fixture_config, fixture_tracker, test_issue, APPROVERS_ID};
