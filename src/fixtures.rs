//! The fixture catalog.
//!
//! Each definition names one CSV file and its ordered columns. The catalog is
//! static; column semantics are resolved by the field dispatch at generation
//! time, and `verify_catalog` checks every column against the known strategies
//! at startup so typos surface before any store work.

use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::fields::strategy_for;

/// Top-level grouping mirrored by the output directory tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureGroup {
    Correspondence,
    Tasks,
}

impl FixtureGroup {
    pub fn dir_name(&self) -> &'static str {
        match self {
            FixtureGroup::Correspondence => "correspondence",
            FixtureGroup::Tasks => "tasks",
        }
    }
}

impl fmt::Display for FixtureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One named CSV file and its ordered columns
#[derive(Debug, Clone, Copy)]
pub struct FixtureDef {
    pub name: &'static str,
    pub group: FixtureGroup,
    pub columns: &'static [&'static str],
}

impl FixtureDef {
    /// Relative path of the fixture file within a run directory
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.group.dir_name()).join(format!("{}.csv", self.name))
    }

    /// Group-qualified display label
    pub fn label(&self) -> String {
        format!("{}/{}", self.group.dir_name(), self.name)
    }
}

/// Every fixture produced by a full run, correspondence group first
pub const CATALOG: &[FixtureDef] = &[
    FixtureDef {
        name: "BrowseCorrespondence",
        group: FixtureGroup::Correspondence,
        columns: &[
            "token",
            "correspondenceId",
            "organizationId",
            "contactEmployeeId",
            "userId",
            "username",
        ],
    },
    FixtureDef {
        name: "CreateCorrespondence",
        group: FixtureGroup::Correspondence,
        columns: &[
            "token",
            "organizationId",
            "contactEmployeeId",
            "externalReference",
            "subject",
            "priorityId",
            "typeId",
            "typeName",
            "typeNameAr",
            "sourceId",
            "statusId",
            "organizationName",
            "employeeName",
            "tenantId",
        ],
    },
    FixtureDef {
        name: "EditCorrespondence",
        group: FixtureGroup::Correspondence,
        columns: &[
            "token",
            "correspondenceId",
            "organizationId",
            "contactEmployeeId",
            "entityId",
            "userId",
            "priorityId",
            "typeId",
            "typeName",
            "typeNameAr",
            "sourceId",
            "statusId",
            "subject",
            "externalReference",
            "organizationName",
            "employeeName",
            "correspondencePropertyId",
        ],
    },
    FixtureDef {
        name: "DraftCorrespondence",
        group: FixtureGroup::Correspondence,
        columns: &[
            "token",
            "correspondenceId",
            "organizationId",
            "contactEmployeeId",
            "entityId",
            "userId",
            "typeId",
            "subject",
            "externalReference",
        ],
    },
    FixtureDef {
        name: "ArchivedCorrespondence",
        group: FixtureGroup::Correspondence,
        columns: &["token", "correspondenceId", "organizationId", "userId", "accountId"],
    },
    FixtureDef {
        name: "ReminderCorrespondence",
        group: FixtureGroup::Correspondence,
        columns: &["token", "correspondenceId", "userId", "reminderText", "reminderDate"],
    },
    FixtureDef {
        name: "PrintCorrespondence",
        group: FixtureGroup::Correspondence,
        columns: &["token", "correspondenceId", "userId", "templateId"],
    },
    FixtureDef {
        name: "ChangeHistoryCorrespondence",
        group: FixtureGroup::Correspondence,
        columns: &["token", "correspondenceId", "userId"],
    },
    FixtureDef {
        name: "BrowseTasks",
        group: FixtureGroup::Tasks,
        columns: &[
            "token",
            "taskId",
            "correspondenceId",
            "userId",
            "assigneeId",
            "username",
        ],
    },
    FixtureDef {
        name: "AddTaskFromCorrespondence",
        group: FixtureGroup::Tasks,
        columns: &[
            "token",
            "correspondenceId",
            "assigneeUserId",
            "typeId",
            "comment",
            "dueDate",
            "tenantId",
        ],
    },
    FixtureDef {
        name: "CloseTask",
        group: FixtureGroup::Tasks,
        columns: &["token", "taskId", "correspondenceId", "userId", "closeComment"],
    },
    FixtureDef {
        name: "CloseTaskWithCC",
        group: FixtureGroup::Tasks,
        columns: &[
            "token",
            "taskId",
            "correspondenceId",
            "userId",
            "ccUserId",
            "closeComment",
        ],
    },
    FixtureDef {
        name: "CCTasks",
        group: FixtureGroup::Tasks,
        columns: &["token", "taskId", "correspondenceId", "userId", "originalTaskId"],
    },
    FixtureDef {
        name: "TransferTask",
        group: FixtureGroup::Tasks,
        columns: &[
            "token",
            "taskId",
            "correspondenceId",
            "userId",
            "transferToUserId",
            "comment",
        ],
    },
    FixtureDef {
        name: "TransferTaskMultipleAssignees",
        group: FixtureGroup::Tasks,
        columns: &["token", "taskId", "correspondenceId", "userId", "assigneeUserIds"],
    },
    FixtureDef {
        name: "FollowTask",
        group: FixtureGroup::Tasks,
        columns: &["token", "taskId", "correspondenceId", "userId"],
    },
    FixtureDef {
        name: "TaskReminder",
        group: FixtureGroup::Tasks,
        columns: &[
            "token",
            "taskId",
            "correspondenceId",
            "userId",
            "reminderText",
            "reminderDate",
        ],
    },
    FixtureDef {
        name: "ReplyToSender",
        group: FixtureGroup::Tasks,
        columns: &["token", "taskId", "correspondenceId", "userId", "replyComment"],
    },
    FixtureDef {
        name: "CreateOutboundFromTask",
        group: FixtureGroup::Tasks,
        columns: &[
            "token",
            "taskId",
            "correspondenceId",
            "organizationId",
            "contactEmployeeId",
            "subject",
            "externalReference",
            "tenantId",
        ],
    },
    FixtureDef {
        name: "TaskAttachments",
        group: FixtureGroup::Tasks,
        columns: &[
            "token",
            "taskId",
            "correspondenceId",
            "attachmentId",
            "userId",
            "fileName",
            "mimeType",
            "filePath",
        ],
    },
];

/// Check every catalog column against the known field strategies.
///
/// Unknown columns are warned about here and resolve to the sentinel at
/// generation time; they never abort the run. Returns the unknown names.
pub fn verify_catalog(catalog: &[FixtureDef]) -> Vec<String> {
    let mut unknown = Vec::new();
    for fixture in catalog {
        for column in fixture.columns {
            if strategy_for(column, fixture.group).is_none() {
                warn!(
                    "Fixture {} column {} matches no strategy; it will emit the sentinel",
                    fixture.label(),
                    column
                );
                unknown.push(format!("{}:{}", fixture.label(), column));
            }
        }
    }
    if unknown.is_empty() {
        info!("Fixture catalog verified: {} definitions", catalog.len());
    }
    unknown
}
