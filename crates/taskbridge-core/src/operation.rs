use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::assets::Fragment;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// Raw pagination input as received from a CLI flag or a tool argument.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct PageInput {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

impl PageRequest {
    /// Caps the limit at [`MAX_LIMIT`].
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.min(MAX_LIMIT),
            offset: self.offset,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TaskQuery {
    pub project_id: Option<String>,
    pub tag_id: Option<String>,
    pub flagged: Option<bool>,
    #[serde(default)]
    pub include_completed: bool,
    pub due_before: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub tag_id: Option<String>,
    pub flagged: Option<bool>,
    pub include_completed: bool,
    pub due_before: Option<NaiveDateTime>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProjectQuery {
    pub folder_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    OnHold,
    Done,
    Dropped,
}

impl ProjectStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "active" => Some(ProjectStatus::Active),
            "on hold" | "onhold" => Some(ProjectStatus::OnHold),
            "done" | "completed" => Some(ProjectStatus::Done),
            "dropped" => Some(ProjectStatus::Dropped),
            _ => None,
        }
    }

    /// Host enumeration constant for this status.
    pub fn host_constant(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active status",
            ProjectStatus::OnHold => "on hold status",
            ProjectStatus::Done => "done status",
            ProjectStatus::Dropped => "dropped status",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFilter {
    pub folder_id: Option<String>,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewTaskInput {
    pub name: String,
    pub note: Option<String>,
    pub project_id: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    pub due: Option<String>,
    pub defer: Option<String>,
    #[serde(default)]
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub name: String,
    pub note: Option<String>,
    pub project_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub due: Option<NaiveDateTime>,
    pub defer: Option<NaiveDateTime>,
    pub flagged: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TaskUpdateInput {
    pub name: Option<String>,
    pub note: Option<String>,
    pub flagged: Option<bool>,
    /// A date, or `none` to clear it.
    pub due: Option<String>,
    pub defer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateChange {
    Set(NaiveDateTime),
    Clear,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub note: Option<String>,
    pub flagged: Option<bool>,
    pub due: Option<DateChange>,
    pub defer: Option<DateChange>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.note.is_none()
            && self.flagged.is_none()
            && self.due.is_none()
            && self.defer.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewProjectInput {
    pub name: String,
    pub note: Option<String>,
    pub folder_id: Option<String>,
    #[serde(default)]
    pub sequential: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub note: Option<String>,
    pub folder_id: Option<String>,
    pub sequential: bool,
}

/// One logical operation applied to every identifier of a batch call.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    Complete,
    Delete,
    Defer { days: u32 },
    Update(TaskChanges),
}

impl BatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            BatchOperation::Complete => "complete",
            BatchOperation::Delete => "delete",
            BatchOperation::Defer { .. } => "defer",
            BatchOperation::Update(_) => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Status,
    ListTasks { filter: TaskFilter, page: PageRequest },
    GetTask { id: String },
    CreateTask(NewTask),
    UpdateTask { id: String, changes: TaskChanges },
    CompleteTask { id: String },
    DeferTask { id: String, days: u32 },
    DeleteTask { id: String },
    ListProjects { filter: ProjectFilter, page: PageRequest },
    GetProject { id: String },
    CreateProject(NewProject),
    CompleteProject { id: String },
    ListTags { page: PageRequest },
    CreateTag { name: String, parent_id: Option<String> },
    ListFolders { page: PageRequest },
    ListPerspectives,
    ShowPerspective { name: String },
    BatchChunk { operation: BatchOperation, ids: Vec<String> },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Status => "status",
            Operation::ListTasks { .. } => "list_tasks",
            Operation::GetTask { .. } => "get_task",
            Operation::CreateTask(_) => "create_task",
            Operation::UpdateTask { .. } => "update_task",
            Operation::CompleteTask { .. } => "complete_task",
            Operation::DeferTask { .. } => "defer_task",
            Operation::DeleteTask { .. } => "delete_task",
            Operation::ListProjects { .. } => "list_projects",
            Operation::GetProject { .. } => "get_project",
            Operation::CreateProject(_) => "create_project",
            Operation::CompleteProject { .. } => "complete_project",
            Operation::ListTags { .. } => "list_tags",
            Operation::CreateTag { .. } => "create_tag",
            Operation::ListFolders { .. } => "list_folders",
            Operation::ListPerspectives => "list_perspectives",
            Operation::ShowPerspective { .. } => "show_perspective",
            Operation::BatchChunk { .. } => "batch_chunk",
        }
    }

    /// Shared fragments the compiled script needs ahead of its body.
    pub fn fragments(&self) -> Vec<Fragment> {
        match self {
            Operation::Status
            | Operation::DeleteTask { .. }
            | Operation::ListPerspectives
            | Operation::ShowPerspective { .. } => vec![Fragment::JsonEncode],
            Operation::BatchChunk { .. } => vec![Fragment::JsonEncode],
            Operation::ListTasks { .. }
            | Operation::GetTask { .. }
            | Operation::CreateTask(_)
            | Operation::UpdateTask { .. }
            | Operation::CompleteTask { .. }
            | Operation::DeferTask { .. } => vec![Fragment::JsonEncode, Fragment::TaskJson],
            Operation::ListProjects { .. }
            | Operation::GetProject { .. }
            | Operation::CreateProject(_)
            | Operation::CompleteProject { .. } => {
                vec![Fragment::JsonEncode, Fragment::ProjectJson]
            }
            Operation::ListTags { .. } | Operation::CreateTag { .. } => {
                vec![Fragment::JsonEncode, Fragment::TagJson]
            }
            Operation::ListFolders { .. } => vec![Fragment::JsonEncode, Fragment::FolderJson],
        }
    }
}

/// A validated request, ready to compile. Built per call and dropped after.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub operation: Operation,
    pub fragments: Vec<Fragment>,
}

impl OperationDescriptor {
    pub fn new(operation: Operation) -> Self {
        let fragments = operation.fragments();
        Self {
            operation,
            fragments,
        }
    }

    pub fn name(&self) -> &'static str {
        self.operation.name()
    }
}
