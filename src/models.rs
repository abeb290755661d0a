// Shared data models for the fixture toolkit.
//
// The same document types serve both sides of the pipeline: the provisioning
// tool writes `UsersFile`, the engine and the bulk-login tool read it back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Credential input/output document (users.json)
// ============================================================================

/// Top-level document produced by provisioning and consumed by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersFile {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_users: usize,
    #[serde(default)]
    pub successful_users: usize,
    pub users: Vec<CredentialEntry>,
}

/// One provisioned account; `success: false` entries are never authenticated
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEntry {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_success() -> bool {
    true
}

// ============================================================================
// Roster and access scopes
// ============================================================================

/// One authenticated identity; immutable for the run
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    /// Opaque provisioning-time identifier; empty when the input file
    /// carries none
    pub account_id: String,
    /// Numeric id decoded from the bearer token's subject claim
    pub user_id: i64,
    pub token: String,
}

/// Resource kinds that carry per-user access scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Correspondence,
    Task,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Correspondence => write!(f, "correspondence"),
            ResourceKind::Task => write!(f, "task"),
        }
    }
}

/// Resource ids one user is authorized to see, per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessScope {
    pub user_id: i64,
    pub correspondence_ids: Vec<i64>,
    pub task_ids: Vec<i64>,
}

impl AccessScope {
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn ids_for(&self, kind: ResourceKind) -> &[i64] {
        match kind {
            ResourceKind::Correspondence => &self.correspondence_ids,
            ResourceKind::Task => &self.task_ids,
        }
    }
}

// ============================================================================
// Sampled reference rows and cell values
// ============================================================================

/// Row sampled from a reference/lookup table; `name_ar` only exists on the
/// type lookup tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefRecord {
    pub id: i64,
    pub name: String,
    pub name_ar: Option<String>,
}

impl RefRecord {
    /// Fallback record used when a table or collection yields nothing
    pub fn sentinel() -> Self {
        Self {
            id: 1,
            name: "Default".to_string(),
            name_ar: None,
        }
    }
}

/// One resolved CSV cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Int(n)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

// ============================================================================
// Run summary
// ============================================================================

/// Final report printed after a generation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub users_attempted: usize,
    pub users_authenticated: usize,
    pub rows_per_fixture: usize,
    pub fixtures_written: Vec<String>,
    pub fixtures_failed: Vec<String>,
    pub output_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_success_flag_defaults_true() {
        let entry: CredentialEntry =
            serde_json::from_str(r#"{"username": "loadtest-01-abc123"}"#).unwrap();
        assert!(entry.success);
        assert!(entry.password.is_none());
        assert!(entry.account_id.is_none());
    }

    #[test]
    fn test_entry_round_trip_keeps_camel_case() {
        let entry: CredentialEntry = serde_json::from_str(
            r#"{"username": "u", "accountId": "acc-1", "success": false, "error": "locked"}"#,
        )
        .unwrap();
        assert_eq!(entry.account_id.as_deref(), Some("acc-1"));
        assert!(!entry.success);

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["accountId"], "acc-1");
        assert!(back.get("password").is_none());
    }

    #[test]
    fn test_scope_ids_for_kind() {
        let scope = AccessScope {
            user_id: 9,
            correspondence_ids: vec![1, 2],
            task_ids: vec![3],
        };
        assert_eq!(scope.ids_for(ResourceKind::Correspondence), &[1, 2]);
        assert_eq!(scope.ids_for(ResourceKind::Task), &[3]);
        assert!(AccessScope::empty(9)
            .ids_for(ResourceKind::Task)
            .is_empty());
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Int(42).to_string(), "42");
        assert_eq!(FieldValue::from("REF-12").to_string(), "REF-12");
    }

    #[test]
    fn test_sentinel_record() {
        let s = RefRecord::sentinel();
        assert_eq!(s.id, 1);
        assert_eq!(s.name, "Default");
    }
}
