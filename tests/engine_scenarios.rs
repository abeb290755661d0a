//! End-to-end engine scenarios with injected samplers and a mocked identity
//! endpoint.

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use loadtest_fixtures::config::{IdentityConfig, ProvisioningConfig};
use loadtest_fixtures::credentials::load_credentials;
use loadtest_fixtures::engine::{authenticate_roster, Engine};
use loadtest_fixtures::errors::{FatalError, StoreResult};
use loadtest_fixtures::fixtures::{FixtureDef, FixtureGroup};
use loadtest_fixtures::identity::{decode_user_id, IdentityClient};
use loadtest_fixtures::models::{FieldValue, RefRecord, ResourceKind, UserRecord};
use loadtest_fixtures::pacer::PacedQueue;
use loadtest_fixtures::provisioning::Provisioner;
use loadtest_fixtures::stores::{DocCollection, DocumentSampler, RefTable, RelationalSampler};

// ============================================================================
// Stub stores
// ============================================================================

#[derive(Default)]
struct StubRelational {
    refs: HashMap<RefTable, Vec<RefRecord>>,
    correspondence_scopes: HashMap<i64, Vec<i64>>,
    task_scopes: HashMap<i64, Vec<i64>>,
    fallback: HashMap<ResourceKind, i64>,
}

#[async_trait]
impl RelationalSampler for StubRelational {
    async fn sample_reference(&self, table: RefTable) -> StoreResult<Vec<RefRecord>> {
        Ok(self.refs.get(&table).cloned().unwrap_or_default())
    }

    async fn sample_resource_id(&self, kind: ResourceKind) -> StoreResult<Option<i64>> {
        Ok(self.fallback.get(&kind).copied())
    }

    async fn fetch_correspondence_scope(&self, user_id: i64) -> StoreResult<Vec<i64>> {
        Ok(self
            .correspondence_scopes
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_task_scope(&self, user_id: i64) -> StoreResult<Vec<i64>> {
        Ok(self.task_scopes.get(&user_id).cloned().unwrap_or_default())
    }
}

struct StubDocuments;

#[async_trait]
impl DocumentSampler for StubDocuments {
    async fn sample_document(
        &self,
        _collection: DocCollection,
        _tenant_id: &str,
    ) -> StoreResult<Option<FieldValue>> {
        Ok(Some(FieldValue::Int(4242)))
    }
}

fn user(name: &str, user_id: i64, token: &str) -> UserRecord {
    UserRecord {
        username: name.to_string(),
        account_id: format!("acc-{}", user_id),
        user_id,
        token: token.to_string(),
    }
}

fn read_csv(path: &std::path::Path) -> (csv::StringRecord, Vec<csv::StringRecord>) {
    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.ends_with('\n'), "missing trailing newline");
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers().unwrap().clone();
    let records = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
    (headers, records)
}

// ============================================================================
// Engine scenarios
// ============================================================================

#[tokio::test]
async fn two_users_four_rows_bind_round_robin_and_stay_in_scope() {
    let mut store = StubRelational::default();
    store.refs.insert(
        RefTable::Users,
        vec![RefRecord {
            id: 500,
            name: String::new(),
            name_ar: None,
        }],
    );
    store.correspondence_scopes.insert(1, vec![11, 12]);
    store.correspondence_scopes.insert(2, vec![21]);

    let fixture = FixtureDef {
        name: "Scenario",
        group: FixtureGroup::Correspondence,
        columns: &["token", "correspondenceId", "userId"],
    };
    let roster = vec![user("a", 1, "token-a"), user("b", 2, "token-b")];

    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(&store, None, "tenant");
    let summary = engine
        .run(&[fixture], &roster, 4, dir.path())
        .await
        .unwrap();

    assert_eq!(summary.fixtures_written, vec!["correspondence/Scenario"]);
    assert!(summary.fixtures_failed.is_empty());

    let path = dir.path().join("correspondence/Scenario.csv");
    let (headers, records) = read_csv(&path);
    assert_eq!(
        headers,
        csv::StringRecord::from(vec!["token", "correspondenceId", "userId"])
    );
    assert_eq!(records.len(), 4);

    // Round-robin: rows 0 and 2 bound to user a, rows 1 and 3 to user b
    assert_eq!(&records[0][0], "token-a");
    assert_eq!(&records[1][0], "token-b");
    assert_eq!(&records[2][0], "token-a");
    assert_eq!(&records[3][0], "token-b");

    for (index, record) in records.iter().enumerate() {
        let scope = if index % 2 == 0 {
            &[11_i64, 12][..]
        } else {
            &[21][..]
        };
        let id: i64 = record[1].parse().unwrap();
        assert!(scope.contains(&id), "row {} out of scope: {}", index, id);
        assert_eq!(&record[2], "500");
    }
}

#[tokio::test]
async fn round_robin_gives_every_user_their_floor_share() {
    let store = StubRelational::default();
    let fixture = FixtureDef {
        name: "Binding",
        group: FixtureGroup::Tasks,
        columns: &["token"],
    };
    let roster = vec![
        user("a", 1, "t-a"),
        user("b", 2, "t-b"),
        user("c", 3, "t-c"),
    ];

    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(&store, None, "tenant");
    engine.run(&[fixture], &roster, 7, dir.path()).await.unwrap();

    let (_, records) = read_csv(&dir.path().join("tasks/Binding.csv"));
    assert_eq!(records.len(), 7);

    // Each user bound to at least floor(7/3) rows
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in &records {
        *counts.entry(record[0].to_string()).or_default() += 1;
    }
    for token in ["t-a", "t-b", "t-c"] {
        assert!(counts[token] >= 2, "{} bound to {} rows", token, counts[token]);
    }

    // Row i and row i+M share a bound user
    for i in 0..4 {
        assert_eq!(&records[i][0], &records[i + 3][0]);
    }
}

#[tokio::test]
async fn unmapped_column_emits_sentinel_and_the_run_survives() {
    let store = StubRelational::default();
    let fixture = FixtureDef {
        name: "Mystery",
        group: FixtureGroup::Correspondence,
        columns: &["token", "mysteryColumn"],
    };
    let roster = vec![user("a", 1, "t-a")];

    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(&store, None, "tenant");
    let summary = engine.run(&[fixture], &roster, 2, dir.path()).await.unwrap();
    assert_eq!(summary.fixtures_written.len(), 1);

    let (_, records) = read_csv(&dir.path().join("correspondence/Mystery.csv"));
    for record in &records {
        assert_eq!(&record[1], "1");
    }
}

#[tokio::test]
async fn a_failing_fixture_is_recorded_and_the_run_continues() {
    let store = StubRelational::default();
    let blocked = FixtureDef {
        name: "Blocked",
        group: FixtureGroup::Tasks,
        columns: &["token"],
    };
    let next = FixtureDef {
        name: "AfterBlocked",
        group: FixtureGroup::Tasks,
        columns: &["token"],
    };
    let roster = vec![user("a", 1, "t-a")];

    let dir = tempfile::tempdir().unwrap();
    // A directory squatting on the fixture's path makes its write fail
    std::fs::create_dir_all(dir.path().join("tasks/Blocked.csv")).unwrap();

    let engine = Engine::new(&store, None, "tenant");
    let summary = engine
        .run(&[blocked, next], &roster, 2, dir.path())
        .await
        .unwrap();

    assert_eq!(summary.fixtures_failed, vec!["tasks/Blocked"]);
    assert_eq!(summary.fixtures_written, vec!["tasks/AfterBlocked"]);

    // The fixture after the failure is fully written
    let (_, records) = read_csv(&dir.path().join("tasks/AfterBlocked.csv"));
    assert_eq!(records.len(), 2);
    assert_eq!(&records[0][0], "t-a");
}

#[tokio::test]
async fn document_backed_and_tenant_columns_resolve() {
    let store = StubRelational::default();
    let docs = StubDocuments;
    let fixture = FixtureDef {
        name: "Print",
        group: FixtureGroup::Correspondence,
        columns: &["token", "templateId", "tenantId"],
    };
    let roster = vec![user("a", 1, "t-a")];

    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(&store, Some(&docs), "tenant-9");
    engine.run(&[fixture], &roster, 1, dir.path()).await.unwrap();

    let (_, records) = read_csv(&dir.path().join("correspondence/Print.csv"));
    assert_eq!(&records[0][1], "4242");
    assert_eq!(&records[0][2], "tenant-9");
}

#[tokio::test]
async fn escaped_fields_survive_a_csv_round_trip() {
    let store = StubRelational::default();
    // comment pools contain plain text; subject carries " - " but the row is
    // re-parsed here against the header column count regardless
    let fixture = FixtureDef {
        name: "Escaping",
        group: FixtureGroup::Tasks,
        columns: &["token", "subject", "comment", "dueDate"],
    };
    let roster = vec![user("a", 1, "token,with,commas")];

    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(&store, None, "tenant");
    engine.run(&[fixture], &roster, 3, dir.path()).await.unwrap();

    let (headers, records) = read_csv(&dir.path().join("tasks/Escaping.csv"));
    assert_eq!(headers.len(), 4);
    for record in &records {
        assert_eq!(record.len(), headers.len());
        // The comma-laden token is recovered unescaped
        assert_eq!(&record[0], "token,with,commas");
    }
}

// ============================================================================
// Identity scenarios (mocked endpoint)
// ============================================================================

fn mint_token(sub: i64) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": sub, "name": "loadtest" }),
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

fn identity_config(server: &MockServer) -> IdentityConfig {
    IdentityConfig {
        base_url: server.uri(),
        request_timeout_seconds: 5,
        default_password: "P@ssw0rd1".to_string(),
        request_delay_ms: 0,
    }
}

fn write_users_json(entries: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"users": [{}]}}"#, entries).unwrap();
    file
}

#[tokio::test]
async fn authenticated_user_ids_come_from_the_token_subject() {
    let server = MockServer::start().await;
    let token = mint_token(1375);
    Mock::given(method("POST"))
        .and(path("/api/identity/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": token })))
        .mount(&server)
        .await;

    let file = write_users_json(r#"{"username": "u1", "password": "pw"}"#);
    let credentials = load_credentials(file.path(), "fallback").unwrap();
    let client = IdentityClient::new(identity_config(&server)).unwrap();

    let roster = authenticate_roster(&client, &credentials).await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].user_id, 1375);
    // Re-decoding the stored token recovers the same id
    assert_eq!(decode_user_id(&roster[0].token).unwrap(), 1375);
}

#[tokio::test]
async fn zero_successful_logins_abort_before_any_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/identity/v1/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "bad creds" })))
        .mount(&server)
        .await;

    let file = write_users_json(
        r#"{"username": "u1", "password": "pw"}, {"username": "u2", "password": "pw"}"#,
    );
    let credentials = load_credentials(file.path(), "fallback").unwrap();
    let client = IdentityClient::new(identity_config(&server)).unwrap();

    let err = authenticate_roster(&client, &credentials).await.unwrap_err();
    assert!(matches!(
        err,
        FatalError::NoAuthenticatedUsers { attempted: 2 }
    ));
}

#[tokio::test]
async fn one_bad_credential_is_skipped_not_fatal() {
    let server = MockServer::start().await;
    let token = mint_token(9);
    Mock::given(method("POST"))
        .and(path("/api/identity/v1/token"))
        .and(body_string_contains("username=good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": token })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/identity/v1/token"))
        .and(body_string_contains("username=locked"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "locked" })))
        .mount(&server)
        .await;

    let file = write_users_json(
        r#"{"username": "good", "password": "pw"}, {"username": "locked", "password": "pw"}"#,
    );
    let credentials = load_credentials(file.path(), "fallback").unwrap();
    let client = IdentityClient::new(identity_config(&server)).unwrap();

    let roster = authenticate_roster(&client, &credentials).await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].username, "good");
}

// ============================================================================
// Provisioning scenario (mocked endpoint)
// ============================================================================

#[tokio::test]
async fn provisioning_creates_accounts_and_rotates_passwords() {
    let server = MockServer::start().await;
    let token = mint_token(77);
    Mock::given(method("POST"))
        .and(path("/api/identity/v1/account/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accountId": "acc-77",
            "password": "Initial#1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/identity/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": token })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/identity/v1/account/password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "changed": true })))
        .mount(&server)
        .await;

    let client = IdentityClient::new(identity_config(&server)).unwrap();
    let config = ProvisioningConfig {
        admin_token: Some("admin-token".to_string()),
        user_count: 2,
        role_id: "66f2a1b04a5c3d2e1f000001".to_string(),
        username_prefix: "it-user".to_string(),
        ..Default::default()
    };

    let provisioner = Provisioner::new(client, config);
    let mut queue = PacedQueue::new(0);
    let users_file = provisioner.provision(&mut queue).await.unwrap();

    assert_eq!(users_file.total_users, 2);
    assert_eq!(users_file.successful_users, 2);
    for entry in &users_file.users {
        assert!(entry.success);
        assert!(entry.username.starts_with("it-user-"));
        assert_eq!(entry.account_id.as_deref(), Some("acc-77"));
        assert_eq!(entry.password.as_deref(), Some("P@ssw0rd1"));
    }
}
