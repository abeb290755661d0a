//! Field value dispatch.
//!
//! Every fixture column resolves through a closed [`FieldStrategy`], looked up
//! by name and fixture group. The generator owns the run-lifetime reference
//! samples and is handed the row's bound user, access scope, and a per-row
//! correlation memo so facet columns (a type id and its name variants, an
//! organization id and its name, a file name and its mime type and path) come
//! from one underlying record.

use chrono::{Datelike, Days, Utc};
use rand::{seq::SliceRandom, Rng};
use std::collections::HashMap;
use tracing::warn;

use crate::fixtures::FixtureGroup;
use crate::models::{AccessScope, FieldValue, RefRecord, ResourceKind, UserRecord};
use crate::stores::{DocCollection, DocumentSampler, RefTable, RelationalSampler};

/// Sentinel id emitted when nothing can be sampled
pub const SENTINEL_ID: i64 = 1;

/// Sentinel name emitted when nothing can be sampled
pub const SENTINEL_NAME: &str = "Default";

/// Delimiter joining multi-valued id fields
const MULTI_VALUE_DELIMITER: &str = "|";

/// Picks performed for a multi-valued assignee field, before deduplication
const MULTI_PICK_COUNT: usize = 5;

const SUBJECTS: &[&str] = &[
    "Urgent Request",
    "Follow Up Required",
    "Document Review",
    "Meeting Notes",
    "Budget Approval",
    "Contract Update",
    "Project Status",
    "Action Required",
];

const COMMENTS: &[&str] = &[
    "Please review and process",
    "Awaiting your response",
    "Completed successfully",
    "Requires immediate attention",
    "For your information",
    "Please approve",
    "Forwarded for action",
];

const REMINDERS: &[&str] = &[
    "Follow up on this item",
    "Check status update",
    "Submit final response",
    "Review pending changes",
    "Escalate if needed",
];

/// File name / mime type pairs; one pick serves every file facet in a row
const FILES: &[(&str, &str)] = &[
    ("quarterly-report.pdf", "application/pdf"),
    ("scan-001.png", "image/png"),
    (
        "meeting-notes.docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "budget.xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("policy.txt", "text/plain"),
];

// ============================================================================
// Strategy dispatch
// ============================================================================

/// Identity fields resolved from the bound user or run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughField {
    Token,
    Username,
    AccountId,
    TenantId,
}

/// Facet of a correlated record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Id,
    Name,
    NameAr,
}

/// One underlying record shared by several columns within a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrelationSlot {
    TypeRecord,
    Organization,
    Employee,
}

/// The type lookup the `typeId` facets resolve against, by fixture group
fn type_table(group: FixtureGroup) -> RefTable {
    match group {
        FixtureGroup::Tasks => RefTable::TaskTypes,
        FixtureGroup::Correspondence => RefTable::CorrespondenceTypes,
    }
}

/// Templated synthetic fields with no store mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticField {
    Subject,
    Comment,
    ReminderText,
    ExternalReference,
    FutureDate,
    FileName,
    MimeType,
    FilePath,
}

/// Closed enumeration of field resolution strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStrategy {
    Passthrough(PassthroughField),
    Correlated {
        slot: CorrelationSlot,
        table: RefTable,
        facet: Facet,
    },
    DocumentSample(DocCollection),
    ScopedResource(ResourceKind),
    ReferencePick(RefTable),
    MultiPick { table: RefTable, count: usize },
    Synthetic(SyntheticField),
}

/// Resolve a column name to its strategy, `None` for unmapped columns
pub fn strategy_for(field: &str, group: FixtureGroup) -> Option<FieldStrategy> {
    use FieldStrategy::*;

    let strategy = match field {
        "token" => Passthrough(PassthroughField::Token),
        "username" => Passthrough(PassthroughField::Username),
        "accountId" => Passthrough(PassthroughField::AccountId),
        "tenantId" => Passthrough(PassthroughField::TenantId),

        // The same column name denotes two lookup tables depending on group
        "typeId" => Correlated {
            slot: CorrelationSlot::TypeRecord,
            table: type_table(group),
            facet: Facet::Id,
        },
        "typeName" => Correlated {
            slot: CorrelationSlot::TypeRecord,
            table: type_table(group),
            facet: Facet::Name,
        },
        "typeNameAr" => Correlated {
            slot: CorrelationSlot::TypeRecord,
            table: type_table(group),
            facet: Facet::NameAr,
        },
        "organizationId" => Correlated {
            slot: CorrelationSlot::Organization,
            table: RefTable::ContactOrganizations,
            facet: Facet::Id,
        },
        "organizationName" => Correlated {
            slot: CorrelationSlot::Organization,
            table: RefTable::ContactOrganizations,
            facet: Facet::Name,
        },
        "contactEmployeeId" => Correlated {
            slot: CorrelationSlot::Employee,
            table: RefTable::ContactEmployees,
            facet: Facet::Id,
        },
        "employeeName" => Correlated {
            slot: CorrelationSlot::Employee,
            table: RefTable::ContactEmployees,
            facet: Facet::Name,
        },

        "correspondencePropertyId" => DocumentSample(DocCollection::CorrespondenceProperties),
        "templateId" => DocumentSample(DocCollection::PrintTemplates),

        "correspondenceId" => ScopedResource(ResourceKind::Correspondence),
        "taskId" | "originalTaskId" => ScopedResource(ResourceKind::Task),

        "userId" | "assigneeId" | "assigneeUserId" | "ccUserId" | "transferToUserId" => {
            ReferencePick(RefTable::Users)
        }
        "entityId" => ReferencePick(RefTable::StructureEntities),
        "statusId" => ReferencePick(RefTable::Statuses),
        "priorityId" => ReferencePick(RefTable::Priorities),
        "sourceId" => ReferencePick(RefTable::CorrespondenceSources),
        "attachmentId" => ReferencePick(RefTable::Attachments),

        "assigneeUserIds" => MultiPick {
            table: RefTable::Users,
            count: MULTI_PICK_COUNT,
        },

        "subject" => Synthetic(SyntheticField::Subject),
        "comment" | "closeComment" | "replyComment" => Synthetic(SyntheticField::Comment),
        "reminderText" => Synthetic(SyntheticField::ReminderText),
        "externalReference" => Synthetic(SyntheticField::ExternalReference),
        "reminderDate" | "dueDate" => Synthetic(SyntheticField::FutureDate),
        "fileName" => Synthetic(SyntheticField::FileName),
        "mimeType" => Synthetic(SyntheticField::MimeType),
        "filePath" => Synthetic(SyntheticField::FilePath),

        _ => return None,
    };
    Some(strategy)
}

// ============================================================================
// Per-row correlation memo
// ============================================================================

/// Records fetched for the current row, shared by facet columns
#[derive(Debug, Default)]
pub struct RowContext {
    records: HashMap<CorrelationSlot, RefRecord>,
    file_pick: Option<usize>,
}

impl RowContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn file(&mut self) -> (&'static str, &'static str) {
        let index = *self
            .file_pick
            .get_or_insert_with(|| rand::thread_rng().gen_range(0..FILES.len()));
        FILES[index]
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Resolves fixture columns to values, one cell at a time.
///
/// Owns the run-lifetime reference samples; the roster, scopes, and per-row
/// memo are passed in by the caller.
pub struct FieldGenerator<'a> {
    relational: &'a dyn RelationalSampler,
    documents: Option<&'a dyn DocumentSampler>,
    tenant_id: String,
    samples: HashMap<RefTable, Vec<RefRecord>>,
}

impl<'a> FieldGenerator<'a> {
    pub fn new(
        relational: &'a dyn RelationalSampler,
        documents: Option<&'a dyn DocumentSampler>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            relational,
            documents,
            tenant_id: tenant_id.into(),
            samples: HashMap::new(),
        }
    }

    /// Resolve one cell for the bound user within the active fixture group
    pub async fn resolve(
        &mut self,
        field: &str,
        group: FixtureGroup,
        user: &UserRecord,
        scope: &AccessScope,
        row: &mut RowContext,
    ) -> FieldValue {
        let Some(strategy) = strategy_for(field, group) else {
            warn!("No strategy for field {}; emitting sentinel", field);
            return FieldValue::Int(SENTINEL_ID);
        };

        match strategy {
            FieldStrategy::Passthrough(which) => match which {
                PassthroughField::Token => user.token.clone().into(),
                PassthroughField::Username => user.username.clone().into(),
                PassthroughField::AccountId => user.account_id.clone().into(),
                PassthroughField::TenantId => self.tenant_id.clone().into(),
            },
            FieldStrategy::Correlated { slot, table, facet } => {
                let record = self.correlated_record(slot, table, row).await;
                match facet {
                    Facet::Id => FieldValue::Int(record.id),
                    Facet::Name => record.name.into(),
                    Facet::NameAr => record
                        .name_ar
                        .unwrap_or_else(|| SENTINEL_NAME.to_string())
                        .into(),
                }
            }
            FieldStrategy::DocumentSample(collection) => self.document_sample(collection).await,
            FieldStrategy::ScopedResource(kind) => self.scoped_pick(kind, scope).await,
            FieldStrategy::ReferencePick(table) => {
                FieldValue::Int(self.reference_pick(table).await.id)
            }
            FieldStrategy::MultiPick { table, count } => self.multi_pick(table, count).await,
            FieldStrategy::Synthetic(which) => synthesize(which, row),
        }
    }

    /// Lazily fetched, run-lifetime sample for one reference table
    async fn sample(&mut self, table: RefTable) -> &[RefRecord] {
        if !self.samples.contains_key(&table) {
            let records = match self.relational.sample_reference(table).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(
                        "Sampling {} failed: {}; picks degrade to sentinel",
                        table.table_name(),
                        e
                    );
                    Vec::new()
                }
            };
            self.samples.insert(table, records);
        }
        &self.samples[&table]
    }

    async fn reference_pick(&mut self, table: RefTable) -> RefRecord {
        self.sample(table)
            .await
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(RefRecord::sentinel)
    }

    async fn correlated_record(
        &mut self,
        slot: CorrelationSlot,
        table: RefTable,
        row: &mut RowContext,
    ) -> RefRecord {
        if let Some(record) = row.records.get(&slot) {
            return record.clone();
        }
        let record = self.reference_pick(table).await;
        row.records.insert(slot, record.clone());
        record
    }

    /// Prefer the bound user's scope; fall back to an unscoped filtered pick
    async fn scoped_pick(&mut self, kind: ResourceKind, scope: &AccessScope) -> FieldValue {
        if let Some(id) = scope.ids_for(kind).choose(&mut rand::thread_rng()) {
            return FieldValue::Int(*id);
        }

        match self.relational.sample_resource_id(kind).await {
            Ok(Some(id)) => FieldValue::Int(id),
            Ok(None) => {
                warn!("No {} rows to sample; emitting sentinel", kind);
                FieldValue::Int(SENTINEL_ID)
            }
            Err(e) => {
                warn!("Unscoped {} pick failed: {}; emitting sentinel", kind, e);
                FieldValue::Int(SENTINEL_ID)
            }
        }
    }

    async fn document_sample(&mut self, collection: DocCollection) -> FieldValue {
        let Some(documents) = self.documents else {
            return FieldValue::Int(SENTINEL_ID);
        };
        match documents.sample_document(collection, &self.tenant_id).await {
            Ok(Some(value)) => value,
            Ok(None) => FieldValue::Int(SENTINEL_ID),
            Err(e) => {
                warn!(
                    "Document sample from {} failed: {}; emitting sentinel",
                    collection.collection_name(),
                    e
                );
                FieldValue::Int(SENTINEL_ID)
            }
        }
    }

    /// Repeated picks, deduplicated preserving order, joined with `|`
    async fn multi_pick(&mut self, table: RefTable, count: usize) -> FieldValue {
        let mut ids: Vec<i64> = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.reference_pick(table).await.id;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(MULTI_VALUE_DELIMITER)
            .into()
    }
}

fn synthesize(field: SyntheticField, row: &mut RowContext) -> FieldValue {
    let mut rng = rand::thread_rng();
    match field {
        SyntheticField::Subject => format!(
            "{} - {}",
            SUBJECTS.choose(&mut rng).unwrap_or(&SUBJECTS[0]),
            Utc::now().timestamp_millis()
        )
        .into(),
        SyntheticField::Comment => (*COMMENTS.choose(&mut rng).unwrap_or(&COMMENTS[0])).into(),
        SyntheticField::ReminderText => {
            (*REMINDERS.choose(&mut rng).unwrap_or(&REMINDERS[0])).into()
        }
        SyntheticField::ExternalReference => {
            format!("REF-{}", rng.gen_range(0..100_000)).into()
        }
        SyntheticField::FutureDate => {
            let days = rng.gen_range(1..=30);
            let date = Utc::now().date_naive() + Days::new(days);
            date.format("%Y-%m-%d").to_string().into()
        }
        SyntheticField::FileName => row.file().0.into(),
        SyntheticField::MimeType => row.file().1.into(),
        SyntheticField::FilePath => {
            let now = Utc::now();
            format!(
                "uploads/{}/{:02}/{}",
                now.year(),
                now.month(),
                row.file().0
            )
            .into()
        }
    }
}
