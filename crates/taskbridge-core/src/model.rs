use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operation::ProjectStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub defer_date: Option<String>,
    #[serde(default)]
    pub completion_date: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub note: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub task_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parent_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parent_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perspective {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Project,
    Tag,
    Folder,
    Perspective,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Task => "task",
            EntityKind::Project => "project",
            EntityKind::Tag => "tag",
            EntityKind::Folder => "folder",
            EntityKind::Perspective => "perspective",
        }
    }
}

/// Host object tagged with its kind at parse time, so nothing downstream
/// has to guess the shape from which fields are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Task(Task),
    Project(Project),
    Tag(Tag),
    Folder(Folder),
    Perspective(Perspective),
}

impl Entity {
    pub fn from_value(kind: EntityKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EntityKind::Task => Entity::Task(serde_json::from_value(value)?),
            EntityKind::Project => Entity::Project(serde_json::from_value(value)?),
            EntityKind::Tag => Entity::Tag(serde_json::from_value(value)?),
            EntityKind::Folder => Entity::Folder(serde_json::from_value(value)?),
            EntityKind::Perspective => Entity::Perspective(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Task(_) => EntityKind::Task,
            Entity::Project(_) => EntityKind::Project,
            Entity::Tag(_) => EntityKind::Tag,
            Entity::Folder(_) => EntityKind::Folder,
            Entity::Perspective(_) => EntityKind::Perspective,
        }
    }

    /// Perspectives are addressed by name and have no id.
    pub fn id(&self) -> Option<&str> {
        match self {
            Entity::Task(task) => Some(&task.id),
            Entity::Project(project) => Some(&project.id),
            Entity::Tag(tag) => Some(&tag.id),
            Entity::Folder(folder) => Some(&folder.id),
            Entity::Perspective(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Task(task) => &task.name,
            Entity::Project(project) => &project.name,
            Entity::Tag(tag) => &tag.name,
            Entity::Folder(folder) => &folder.name,
            Entity::Perspective(perspective) => &perspective.name,
        }
    }
}

/// One page of a paginated query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u32,
    pub returned_count: u32,
    pub offset: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Checks the counters the script reported against each other.
    pub fn check(&self) -> Result<(), String> {
        if self.items.len() != self.returned_count as usize {
            return Err(format!(
                "returnedCount {} does not match {} items",
                self.returned_count,
                self.items.len()
            ));
        }
        if self.returned_count > self.limit {
            return Err(format!(
                "returnedCount {} exceeds limit {}",
                self.returned_count, self.limit
            ));
        }
        if self.returned_count > self.total_count {
            return Err(format!(
                "returnedCount {} exceeds totalCount {}",
                self.returned_count, self.total_count
            ));
        }
        let expected = u64::from(self.total_count) > u64::from(self.offset) + u64::from(self.returned_count);
        if self.has_more != expected {
            return Err(format!(
                "hasMore {} inconsistent with totalCount {}, offset {}, returnedCount {}",
                self.has_more, self.total_count, self.offset, self.returned_count
            ));
        }
        Ok(())
    }

    pub fn map_items<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        let items = self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?;
        Ok(Page {
            items,
            total_count: self.total_count,
            returned_count: self.returned_count,
            offset: self.offset,
            limit: self.limit,
            has_more: self.has_more,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    pub running: bool,
    #[serde(default)]
    pub version: Option<String>,
}
