//! Credential loading from the provisioned users document.

use std::path::Path;
use tracing::{debug, info};

use crate::errors::{FatalError, FatalResult};
use crate::models::UsersFile;

/// A username/password pair ready for authentication
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
    /// Empty when the input entry carries no account id
    pub account_id: String,
}

/// Load usable credentials from the users document at `path`.
///
/// Entries marked failed are dropped; entries without a password fall back to
/// `default_password`. A missing or malformed file aborts the run, as does a
/// file with no usable entries.
pub fn load_credentials(path: &Path, default_password: &str) -> FatalResult<Vec<Credential>> {
    let raw = std::fs::read_to_string(path).map_err(|source| FatalError::CredentialsFileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let file: UsersFile = serde_json::from_str(&raw)?;

    let total = file.users.len();
    let mut credentials = Vec::with_capacity(total);
    for entry in file.users {
        if !entry.success {
            debug!("Skipping failed entry: {}", entry.username);
            continue;
        }
        let password = match entry.password {
            Some(password) => password,
            None => {
                debug!("No password for {}; using the default", entry.username);
                default_password.to_string()
            }
        };
        credentials.push(Credential {
            username: entry.username,
            password,
            account_id: entry.account_id.unwrap_or_default(),
        });
    }

    if credentials.is_empty() {
        return Err(FatalError::NoCredentials);
    }

    info!(
        "Loaded {} usable credentials ({} entries in {})",
        credentials.len(),
        total,
        path.display()
    );
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_users_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_failed_entries_are_dropped() {
        let file = write_users_file(
            r#"{
                "baseUrl": "https://qa.example.com",
                "totalUsers": 3,
                "successfulUsers": 2,
                "users": [
                    {"username": "u1", "password": "pw1", "accountId": "a1", "success": true},
                    {"username": "u2", "success": false, "error": "creation rejected"},
                    {"username": "u3", "password": "pw3", "success": true}
                ]
            }"#,
        );

        let credentials = load_credentials(file.path(), "fallback").unwrap();
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[0].username, "u1");
        assert_eq!(credentials[0].account_id, "a1");
        assert_eq!(credentials[1].username, "u3");
        assert_eq!(credentials[1].account_id, "");
    }

    #[test]
    fn test_missing_password_uses_default() {
        let file = write_users_file(r#"{"users": [{"username": "u1"}]}"#);
        let credentials = load_credentials(file.path(), "P@ssw0rd1").unwrap();
        assert_eq!(credentials[0].password, "P@ssw0rd1");
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = load_credentials(Path::new("/nonexistent/users.json"), "pw").unwrap_err();
        assert!(matches!(err, FatalError::CredentialsFileUnreadable { .. }));
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let file = write_users_file("{not json");
        let err = load_credentials(file.path(), "pw").unwrap_err();
        assert!(matches!(err, FatalError::CredentialsFileMalformed(_)));
    }

    #[test]
    fn test_all_failed_entries_is_fatal() {
        let file = write_users_file(r#"{"users": [{"username": "u1", "success": false}]}"#);
        let err = load_credentials(file.path(), "pw").unwrap_err();
        assert!(matches!(err, FatalError::NoCredentials));
    }
}
