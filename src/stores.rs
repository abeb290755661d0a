//! Backing store connections and samplers.
//!
//! The engine reaches the stores only through the `RelationalSampler` and
//! `DocumentSampler` traits, so the generator and scope loader can be tested
//! against injected fixtures. `PostgresStore` and `MongoStore` are the
//! production implementations; the PostgreSQL connection is required while an
//! unreachable MongoDB degrades document sampling to its sentinel for the run.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::ClientOptions,
    Client as MongoClient, Collection, Database as MongoDatabase,
};
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Row,
};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::errors::{FatalError, FatalResult, StoreResult};
use crate::models::{FieldValue, RefRecord, ResourceKind};

/// Upper bound on rows fetched per reference table per run.
///
/// Unscoped picks are uniform over this bounded, randomized sample, NOT over
/// the full table. The bound caps memory and query cost on large tables; it is
/// a deliberate tradeoff inherited from the source tooling, kept as-is.
pub const UNSCOPED_SAMPLE_LIMIT: i64 = 100;

/// Status id of an open correspondence in the statuses lookup
pub const CORRESPONDENCE_STATUS_OPEN: i64 = 1;

/// Reference/lookup tables backing unscoped picks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefTable {
    Users,
    ContactOrganizations,
    ContactEmployees,
    StructureEntities,
    CorrespondenceTypes,
    TaskTypes,
    Statuses,
    Priorities,
    CorrespondenceSources,
    Attachments,
}

/// Which name columns a reference table carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameColumns {
    None,
    Name,
    NameWithArabic,
}

impl RefTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            RefTable::Users => "users",
            RefTable::ContactOrganizations => "contact_organizations",
            RefTable::ContactEmployees => "contact_employees",
            RefTable::StructureEntities => "structure_entities",
            RefTable::CorrespondenceTypes => "correspondence_types",
            RefTable::TaskTypes => "task_types",
            RefTable::Statuses => "statuses",
            RefTable::Priorities => "priorities",
            RefTable::CorrespondenceSources => "correspondence_sources",
            RefTable::Attachments => "attachments",
        }
    }

    pub fn name_columns(&self) -> NameColumns {
        match self {
            RefTable::ContactOrganizations | RefTable::ContactEmployees => NameColumns::Name,
            RefTable::CorrespondenceTypes | RefTable::TaskTypes => NameColumns::NameWithArabic,
            _ => NameColumns::None,
        }
    }
}

/// Document-store collections backing tenant-scoped samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocCollection {
    CorrespondenceProperties,
    PrintTemplates,
}

impl DocCollection {
    pub fn collection_name(&self) -> &'static str {
        match self {
            DocCollection::CorrespondenceProperties => "correspondenceProperties",
            DocCollection::PrintTemplates => "printTemplates",
        }
    }
}

// ============================================================================
// Sampler traits
// ============================================================================

/// Read-only relational boundary used by the scope loader and the generator
#[async_trait]
pub trait RelationalSampler: Send + Sync {
    /// Fetch a randomized sample of up to [`UNSCOPED_SAMPLE_LIMIT`] rows
    async fn sample_reference(&self, table: RefTable) -> StoreResult<Vec<RefRecord>>;

    /// One unscoped random resource id honoring the kind's static predicate
    async fn sample_resource_id(&self, kind: ResourceKind) -> StoreResult<Option<i64>>;

    /// Ids of open, non-deleted correspondences the user may access
    async fn fetch_correspondence_scope(&self, user_id: i64) -> StoreResult<Vec<i64>>;

    /// Ids of live tasks assigned to or created by the user
    async fn fetch_task_scope(&self, user_id: i64) -> StoreResult<Vec<i64>>;
}

/// Read-only document-store boundary used by the generator
#[async_trait]
pub trait DocumentSampler: Send + Sync {
    /// One tenant-filtered random document id, `None` when nothing matches
    async fn sample_document(
        &self,
        collection: DocCollection,
        tenant_id: &str,
    ) -> StoreResult<Option<FieldValue>>;
}

// ============================================================================
// PostgreSQL store
// ============================================================================

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &StoreConfig) -> FatalResult<Self> {
        info!(
            "Connecting to PostgreSQL: {}",
            config.database_url.split('@').last().unwrap_or("hidden")
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| FatalError::RelationalStoreUnavailable(e.to_string()))?;

        info!("PostgreSQL connection established");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RelationalSampler for PostgresStore {
    async fn sample_reference(&self, table: RefTable) -> StoreResult<Vec<RefRecord>> {
        let query = match table.name_columns() {
            NameColumns::None => format!(
                "SELECT id FROM {} ORDER BY random() LIMIT {}",
                table.table_name(),
                UNSCOPED_SAMPLE_LIMIT
            ),
            NameColumns::Name => format!(
                "SELECT id, name FROM {} ORDER BY random() LIMIT {}",
                table.table_name(),
                UNSCOPED_SAMPLE_LIMIT
            ),
            NameColumns::NameWithArabic => format!(
                "SELECT id, name, name_ar FROM {} ORDER BY random() LIMIT {}",
                table.table_name(),
                UNSCOPED_SAMPLE_LIMIT
            ),
        };

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        debug!("Sampled {} rows from {}", rows.len(), table.table_name());

        let records = rows
            .into_iter()
            .map(|row| {
                let (name, name_ar) = match table.name_columns() {
                    NameColumns::None => (String::new(), None),
                    NameColumns::Name => (row.get("name"), None),
                    NameColumns::NameWithArabic => (row.get("name"), row.get("name_ar")),
                };
                RefRecord {
                    id: row.get("id"),
                    name,
                    name_ar,
                }
            })
            .collect();
        Ok(records)
    }

    async fn sample_resource_id(&self, kind: ResourceKind) -> StoreResult<Option<i64>> {
        let id = match kind {
            ResourceKind::Correspondence => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM correspondences \
                     WHERE is_deleted = FALSE AND status_id = $1 \
                     ORDER BY random() LIMIT 1",
                )
                .bind(CORRESPONDENCE_STATUS_OPEN)
                .fetch_optional(&self.pool)
                .await?
            }
            ResourceKind::Task => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM tasks \
                     WHERE is_archived = FALSE AND is_deleted = FALSE \
                     ORDER BY random() LIMIT 1",
                )
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(id)
    }

    async fn fetch_correspondence_scope(&self, user_id: i64) -> StoreResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT c.id FROM correspondences c \
             JOIN correspondence_access_rights ar ON ar.correspondence_id = c.id \
             WHERE ar.user_id = $1 AND c.is_deleted = FALSE AND c.status_id = $2",
        )
        .bind(user_id)
        .bind(CORRESPONDENCE_STATUS_OPEN)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn fetch_task_scope(&self, user_id: i64) -> StoreResult<Vec<i64>> {
        // The user's organizational entity widens the assignment match; NULL
        // simply matches nothing in the join below.
        let entity_id = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT entity_id FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT t.id FROM tasks t \
             LEFT JOIN task_assignments ta ON ta.task_id = t.id \
             WHERE t.is_archived = FALSE AND t.is_deleted = FALSE \
               AND (ta.assignee_user_id = $1 OR ta.assignee_entity_id = $2 \
                    OR t.created_by = $1)",
        )
        .bind(user_id)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

// ============================================================================
// MongoDB store
// ============================================================================

pub struct MongoStore {
    database: MongoDatabase,
}

impl MongoStore {
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        info!("Connecting to MongoDB");

        let client_options = ClientOptions::parse(&config.mongodb_url).await?;
        let client = MongoClient::with_options(client_options)?;
        let database = client.database(&config.mongodb_database);

        database.run_command(doc! { "ping": 1 }, None).await?;

        info!("MongoDB connection established");
        Ok(Self { database })
    }
}

#[async_trait]
impl DocumentSampler for MongoStore {
    async fn sample_document(
        &self,
        collection: DocCollection,
        tenant_id: &str,
    ) -> StoreResult<Option<FieldValue>> {
        let coll: Collection<Document> = self.database.collection(collection.collection_name());
        let pipeline = vec![
            doc! { "$match": { "tenantId": tenant_id } },
            doc! { "$sample": { "size": 1 } },
        ];

        let mut cursor = coll.aggregate(pipeline, None).await?;
        let Some(document) = cursor.try_next().await? else {
            debug!(
                "No {} document for tenant {}",
                collection.collection_name(),
                tenant_id
            );
            return Ok(None);
        };

        // Collections carry either a numeric business id or only the ObjectId
        if let Ok(id) = document.get_i64("id") {
            return Ok(Some(FieldValue::Int(id)));
        }
        if let Ok(id) = document.get_i32("id") {
            return Ok(Some(FieldValue::Int(id as i64)));
        }
        if let Ok(oid) = document.get_object_id("_id") {
            return Ok(Some(FieldValue::Text(oid.to_hex())));
        }
        warn!(
            "Sampled {} document carries no usable id",
            collection.collection_name()
        );
        Ok(None)
    }
}

// ============================================================================
// Run-scoped store handle
// ============================================================================

/// Store connections acquired for one run.
///
/// PostgreSQL is required; MongoDB degrades to `None` on connection failure
/// and every document sample then resolves to its sentinel.
pub struct Stores {
    pub postgres: PostgresStore,
    pub mongo: Option<MongoStore>,
}

impl Stores {
    pub async fn connect(config: &StoreConfig) -> FatalResult<Self> {
        let postgres = PostgresStore::connect(config).await?;
        let mongo = match MongoStore::connect(config).await {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Document store unavailable, samples degrade to defaults: {}", e);
                None
            }
        };
        Ok(Self { postgres, mongo })
    }

    pub fn document_sampler(&self) -> Option<&dyn DocumentSampler> {
        self.mongo.as_ref().map(|m| m as &dyn DocumentSampler)
    }

    /// Release the connections; called on every exit path after acquisition
    pub async fn close(&self) {
        self.postgres.close().await;
        // The MongoDB driver releases its pool on drop
    }
}
