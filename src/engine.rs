//! The fixture generation engine.
//!
//! Drives the run through its phases: authenticate the roster, load access
//! scopes, then generate and write each fixture in turn. Each row is bound to
//! one roster user by row index modulo roster size, a deterministic
//! round-robin, so load spreads evenly across identities and the binding is
//! reproducible for a fixed roster order. A failure in one fixture abandons
//! only that file; the run continues with the next definition.

use anyhow::Context;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::credentials::{load_credentials, Credential};
use crate::csvout;
use crate::errors::{FatalError, FatalResult};
use crate::fields::{FieldGenerator, RowContext};
use crate::fixtures::{verify_catalog, FixtureDef, CATALOG};
use crate::identity::IdentityClient;
use crate::models::{FieldValue, RunSummary, UserRecord};
use crate::scopes::ScopeCache;
use crate::stores::{DocumentSampler, RelationalSampler, Stores};

/// Phases a run moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    AuthenticatingUsers,
    LoadingScopes,
    GeneratingRows,
    Writing,
}

/// Authenticate the roster; zero successes aborts before any store work
pub async fn authenticate_roster(
    client: &IdentityClient,
    credentials: &[Credential],
) -> FatalResult<Vec<UserRecord>> {
    info!("Phase: {:?}", RunPhase::AuthenticatingUsers);
    let roster = client.resolve_roster(credentials).await;
    if roster.is_empty() {
        return Err(FatalError::NoAuthenticatedUsers {
            attempted: credentials.len(),
        });
    }
    Ok(roster)
}

/// The assembler: generates and writes fixtures against injected samplers
pub struct Engine<'a> {
    relational: &'a dyn RelationalSampler,
    documents: Option<&'a dyn DocumentSampler>,
    tenant_id: String,
}

impl<'a> Engine<'a> {
    pub fn new(
        relational: &'a dyn RelationalSampler,
        documents: Option<&'a dyn DocumentSampler>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            relational,
            documents,
            tenant_id: tenant_id.into(),
        }
    }

    /// Generate every fixture in `catalog` under `run_dir`.
    ///
    /// The roster must be non-empty; callers enforce that through
    /// [`authenticate_roster`].
    pub async fn run(
        &self,
        catalog: &[FixtureDef],
        roster: &[UserRecord],
        rows_per_fixture: usize,
        run_dir: &Path,
    ) -> FatalResult<RunSummary> {
        let mut summary = RunSummary {
            users_attempted: roster.len(),
            users_authenticated: roster.len(),
            rows_per_fixture,
            output_dir: Some(run_dir.to_path_buf()),
            ..Default::default()
        };

        info!("Phase: {:?}", RunPhase::LoadingScopes);
        let mut scopes = ScopeCache::new();
        scopes.load_all(self.relational, roster).await;

        create_group_dirs(catalog, run_dir)?;

        let mut generator =
            FieldGenerator::new(self.relational, self.documents, self.tenant_id.clone());

        for fixture in catalog {
            info!(
                "Generating {} with {} row(s)",
                fixture.label(),
                rows_per_fixture
            );
            match self
                .generate_fixture(fixture, roster, &scopes, rows_per_fixture, &mut generator, run_dir)
                .await
            {
                Ok(()) => summary.fixtures_written.push(fixture.label()),
                Err(e) => {
                    error!("Fixture {} failed: {:#}", fixture.label(), e);
                    summary.fixtures_failed.push(fixture.label());
                }
            }
        }

        info!("Phase: {:?}", RunPhase::Idle);
        info!(
            "Run complete: {} fixtures written, {} failed",
            summary.fixtures_written.len(),
            summary.fixtures_failed.len()
        );
        Ok(summary)
    }

    async fn generate_fixture(
        &self,
        fixture: &FixtureDef,
        roster: &[UserRecord],
        scopes: &ScopeCache,
        rows_per_fixture: usize,
        generator: &mut FieldGenerator<'a>,
        run_dir: &Path,
    ) -> anyhow::Result<()> {
        debug!("Phase: {:?} ({})", RunPhase::GeneratingRows, fixture.label());
        let mut rows: Vec<Vec<FieldValue>> = Vec::with_capacity(rows_per_fixture);

        for index in 0..rows_per_fixture {
            // Round-robin binding: row index modulo roster size
            let user = &roster[index % roster.len()];
            let scope = scopes.get(user.user_id);

            let mut row_ctx = RowContext::new();
            let mut row = Vec::with_capacity(fixture.columns.len());
            for column in fixture.columns {
                let value = generator
                    .resolve(column, fixture.group, user, &scope, &mut row_ctx)
                    .await;
                row.push(value);
            }
            rows.push(row);
        }

        debug!("Phase: {:?} ({})", RunPhase::Writing, fixture.label());
        let path = run_dir.join(fixture.relative_path());
        csvout::write_file(&path, fixture.columns, &rows)
            .with_context(|| format!("writing fixture {}", fixture.label()))?;
        Ok(())
    }
}

fn create_group_dirs(catalog: &[FixtureDef], run_dir: &Path) -> FatalResult<()> {
    for fixture in catalog {
        let dir = run_dir.join(fixture.group.dir_name());
        std::fs::create_dir_all(&dir).map_err(|source| FatalError::OutputDirectory {
            path: dir.clone(),
            source,
        })?;
    }
    Ok(())
}

/// Directory name for a run started now: `YYYY-MM-DD_HH-MM-SS`
pub fn run_dir_name() -> String {
    Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Full engine run from settings: credentials, roster, stores, fixtures.
///
/// Store connections are released on every exit path after acquisition.
pub async fn run(settings: &Settings) -> FatalResult<RunSummary> {
    settings.validate()?;
    let unknown = verify_catalog(CATALOG);
    if !unknown.is_empty() {
        info!(
            "{} catalog column(s) will emit sentinels: {}",
            unknown.len(),
            unknown.join(", ")
        );
    }

    let credentials = load_credentials(
        &settings.run.users_file,
        &settings.identity.default_password,
    )?;

    let client = IdentityClient::new(settings.identity.clone())?;
    let roster = authenticate_roster(&client, &credentials).await?;
    let attempted = credentials.len();

    // No database or output work happens before this point
    let stores = Stores::connect(&settings.stores).await?;

    let run_dir: PathBuf = settings.run.output_dir.join(run_dir_name());
    let engine = Engine::new(
        &stores.postgres,
        stores.document_sampler(),
        settings.stores.tenant_id.clone(),
    );
    let result = engine
        .run(CATALOG, &roster, settings.run.rows_per_fixture, &run_dir)
        .await;

    stores.close().await;

    let mut summary = result?;
    summary.users_attempted = attempted;
    report(&summary);
    Ok(summary)
}

fn report(summary: &RunSummary) {
    info!(
        "Authenticated {} of {} users; {} rows per fixture",
        summary.users_authenticated, summary.users_attempted, summary.rows_per_fixture
    );
    for name in &summary.fixtures_written {
        info!("  written: {}", name);
    }
    for name in &summary.fixtures_failed {
        error!("  failed: {}", name);
    }
    if let Some(dir) = &summary.output_dir {
        info!("Output directory: {}", dir.display());
    }
}
