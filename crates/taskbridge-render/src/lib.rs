//! Output formatting for bridge results: plain text, JSON and CSV.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use taskbridge_core::batch::{BatchItem, BatchOutcome};
use taskbridge_core::model::{Entity, EntityKind, HostStatus, Page, Project, Task};
use taskbridge_core::operation::ProjectStatus;
use taskbridge_core::result::{ErrorRecord, TypedResult};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to finish CSV output: {0}")]
    Flush(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown format {:?} (expected text, json, csv)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        })
    }
}

/// A payload that knows how to show itself as text lines and CSV rows.
pub trait Render {
    fn text(&self) -> String;
    /// Header plus records. An empty header means nothing to write.
    fn table(&self) -> (Vec<&'static str>, Vec<Vec<String>>);
}

/// Renders a whole result. JSON keeps the `{success, data, error}` envelope;
/// text and CSV show the payload on success and one error line otherwise.
pub fn render<T: Render + Serialize>(
    result: &TypedResult<T>,
    format: OutputFormat,
) -> Result<String, RenderError> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(result)?);
    }
    match result {
        TypedResult::Failure { error } => Ok(error_line(error)),
        TypedResult::Success { data } => match format {
            OutputFormat::Csv => {
                let (header, rows) = data.table();
                to_csv(&header, &rows)
            }
            _ => Ok(data.text()),
        },
    }
}

pub fn error_line(error: &ErrorRecord) -> String {
    format!("error[{}]: {}", error.code, error.message)
}

fn to_csv(header: &[&str], rows: &[Vec<String>]) -> Result<String, RenderError> {
    if header.is_empty() {
        return Ok(String::new());
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| RenderError::Flush(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| RenderError::Flush(err.to_string()))
}

/// `2026-01-02T09:00:00` becomes `2026-01-02 09:00`; anything unexpected is
/// shown as given.
fn short_date(value: &str) -> String {
    match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        Ok(parsed) => parsed.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => value.to_string(),
    }
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn task_line(task: &Task) -> String {
    let mut parts = vec![format!(
        "{}  [{}] {}",
        task.id,
        if task.completed { "x" } else { " " },
        task.name
    )];
    if task.flagged {
        parts.push("flagged".to_string());
    }
    if let Some(due) = &task.due_date {
        parts.push(format!("due {}", short_date(due)));
    }
    if let Some(defer) = &task.defer_date {
        parts.push(format!("defer {}", short_date(defer)));
    }
    if let Some(project) = &task.project_name {
        parts.push(format!("({})", project));
    }
    if !task.tags.is_empty() {
        let tags: Vec<String> = task.tags.iter().map(|tag| format!("@{}", tag.name)).collect();
        parts.push(tags.join(" "));
    }
    parts.join("  ")
}

fn project_status(project: &Project) -> &'static str {
    match project.status {
        ProjectStatus::Active => "active",
        ProjectStatus::OnHold => "on hold",
        ProjectStatus::Done => "done",
        ProjectStatus::Dropped => "dropped",
    }
}

fn project_line(project: &Project) -> String {
    let mut line = format!(
        "{}  {}  [{}]  {} tasks",
        project.id,
        project.name,
        project_status(project),
        project.task_count
    );
    if project.flagged {
        line.push_str("  flagged");
    }
    if let Some(folder) = &project.folder_name {
        line.push_str(&format!("  in {}", folder));
    }
    line
}

fn nested_line(id: &str, name: &str, parent: &Option<String>) -> String {
    match parent {
        Some(parent) => format!("{}  {}  (in {})", id, name, parent),
        None => format!("{}  {}", id, name),
    }
}

pub fn entity_line(entity: &Entity) -> String {
    match entity {
        Entity::Task(task) => task_line(task),
        Entity::Project(project) => project_line(project),
        Entity::Tag(tag) => nested_line(&tag.id, &tag.name, &tag.parent_name),
        Entity::Folder(folder) => nested_line(&folder.id, &folder.name, &folder.parent_name),
        Entity::Perspective(perspective) => perspective.name.clone(),
    }
}

fn entity_header(kind: EntityKind) -> Vec<&'static str> {
    match kind {
        EntityKind::Task => vec![
            "id", "name", "completed", "flagged", "due", "defer", "project_id", "project", "tags",
        ],
        EntityKind::Project => vec!["id", "name", "status", "flagged", "folder_id", "folder", "task_count"],
        EntityKind::Tag | EntityKind::Folder => vec!["id", "name", "parent_id", "parent"],
        EntityKind::Perspective => vec!["name"],
    }
}

fn entity_record(entity: &Entity) -> Vec<String> {
    match entity {
        Entity::Task(task) => vec![
            task.id.clone(),
            task.name.clone(),
            task.completed.to_string(),
            task.flagged.to_string(),
            opt(&task.due_date),
            opt(&task.defer_date),
            opt(&task.project_id),
            opt(&task.project_name),
            task.tags
                .iter()
                .map(|tag| tag.name.as_str())
                .collect::<Vec<_>>()
                .join(";"),
        ],
        Entity::Project(project) => vec![
            project.id.clone(),
            project.name.clone(),
            project_status(project).to_string(),
            project.flagged.to_string(),
            opt(&project.folder_id),
            opt(&project.folder_name),
            project.task_count.to_string(),
        ],
        Entity::Tag(tag) => vec![
            tag.id.clone(),
            tag.name.clone(),
            opt(&tag.parent_id),
            opt(&tag.parent_name),
        ],
        Entity::Folder(folder) => vec![
            folder.id.clone(),
            folder.name.clone(),
            opt(&folder.parent_id),
            opt(&folder.parent_name),
        ],
        Entity::Perspective(perspective) => vec![perspective.name.clone()],
    }
}

fn entities_table(items: &[Entity]) -> (Vec<&'static str>, Vec<Vec<String>>) {
    match items.first() {
        Some(first) => (
            entity_header(first.kind()),
            items.iter().map(entity_record).collect(),
        ),
        None => (Vec::new(), Vec::new()),
    }
}

pub fn page_footer<T>(page: &Page<T>) -> String {
    if page.returned_count == 0 {
        return format!("showing 0 of {}", page.total_count);
    }
    let mut footer = format!(
        "showing {}-{} of {}",
        page.offset + 1,
        page.offset + page.returned_count,
        page.total_count
    );
    if page.has_more {
        footer.push_str(&format!(
            " (next offset {})",
            page.offset + page.returned_count
        ));
    }
    footer
}

impl Render for Entity {
    fn text(&self) -> String {
        entity_line(self)
    }

    fn table(&self) -> (Vec<&'static str>, Vec<Vec<String>>) {
        (entity_header(self.kind()), vec![entity_record(self)])
    }
}

impl Render for Vec<Entity> {
    fn text(&self) -> String {
        self.iter().map(entity_line).collect::<Vec<_>>().join("\n")
    }

    fn table(&self) -> (Vec<&'static str>, Vec<Vec<String>>) {
        entities_table(self)
    }
}

impl Render for Page<Entity> {
    fn text(&self) -> String {
        let mut lines: Vec<String> = self.items.iter().map(entity_line).collect();
        lines.push(page_footer(self));
        lines.join("\n")
    }

    fn table(&self) -> (Vec<&'static str>, Vec<Vec<String>>) {
        entities_table(&self.items)
    }
}

impl Render for BatchItem {
    fn text(&self) -> String {
        match &self.name {
            Some(name) => format!("{}  {}", self.id, name),
            None => self.id.clone(),
        }
    }

    fn table(&self) -> (Vec<&'static str>, Vec<Vec<String>>) {
        (vec!["id", "name"], vec![vec![self.id.clone(), opt(&self.name)]])
    }
}

impl Render for BatchOutcome<BatchItem> {
    fn text(&self) -> String {
        let mut lines = vec![format!(
            "succeeded: {}, failed: {}",
            self.total_succeeded, self.total_failed
        )];
        for item in &self.failed {
            lines.push(format!("  {}  error[{}]: {}", item.id, item.code, item.error));
        }
        lines.join("\n")
    }

    fn table(&self) -> (Vec<&'static str>, Vec<Vec<String>>) {
        let mut rows: Vec<Vec<String>> = self
            .succeeded
            .iter()
            .map(|item| {
                vec![
                    item.id.clone(),
                    "ok".to_string(),
                    opt(&item.name),
                    String::new(),
                    String::new(),
                ]
            })
            .collect();
        rows.extend(self.failed.iter().map(|item| {
            vec![
                item.id.clone(),
                "failed".to_string(),
                String::new(),
                item.code.to_string(),
                item.error.clone(),
            ]
        }));
        (vec!["id", "status", "name", "code", "error"], rows)
    }
}

impl Render for HostStatus {
    fn text(&self) -> String {
        match (self.running, &self.version) {
            (true, Some(version)) => format!("running (version {})", version),
            (true, None) => "running".to_string(),
            (false, _) => "not running".to_string(),
        }
    }

    fn table(&self) -> (Vec<&'static str>, Vec<Vec<String>>) {
        (
            vec!["running", "version"],
            vec![vec![self.running.to_string(), opt(&self.version)]],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use taskbridge_core::batch::BatchFailure;
    use taskbridge_core::model::{Tag, TagRef};
    use taskbridge_core::result::{failure, success, ErrorCode};

    fn task(id: &str, name: &str) -> Task {
        Task {
            id: id.into(),
            name: name.into(),
            note: None,
            flagged: true,
            completed: false,
            due_date: Some("2026-01-02T09:00:00".into()),
            defer_date: None,
            completion_date: None,
            project_id: Some("p1".into()),
            project_name: Some("Home".into()),
            tags: vec![TagRef {
                id: "t1".into(),
                name: "errands".into(),
            }],
        }
    }

    #[test]
    fn task_text_line() {
        let line = entity_line(&Entity::Task(task("a1", "Buy milk")));
        assert_eq!(line, "a1  [ ] Buy milk  flagged  due 2026-01-02 09:00  (Home)  @errands");
    }

    #[test]
    fn page_text_has_footer() {
        let page = Page {
            items: vec![Entity::Task(task("a1", "Buy milk"))],
            total_count: 100,
            returned_count: 1,
            offset: 50,
            limit: 1,
            has_more: true,
        };
        let text = render(&success(page), OutputFormat::Text).expect("text");
        assert!(text.ends_with("showing 51-51 of 100 (next offset 51)"));
    }

    #[test]
    fn empty_page_footer() {
        let page: Page<Entity> = Page {
            items: vec![],
            total_count: 3,
            returned_count: 0,
            offset: 10,
            limit: 5,
            has_more: false,
        };
        assert_eq!(page_footer(&page), "showing 0 of 3");
    }

    #[test]
    fn failures_render_as_one_error_line() {
        let result: TypedResult<Entity> =
            failure(ErrorRecord::new(ErrorCode::TaskNotFound, "Task not found").with_detail("raw"));
        assert_eq!(
            render(&result, OutputFormat::Text).expect("text"),
            "error[TASK_NOT_FOUND]: Task not found"
        );
        let json = render(&result, OutputFormat::Json).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "TASK_NOT_FOUND");
    }

    #[test]
    fn csv_quotes_fields() {
        let tags = vec![Entity::Tag(Tag {
            id: "t1".into(),
            name: "Errands, misc".into(),
            parent_id: None,
            parent_name: None,
        })];
        let text = render(&success(tags), OutputFormat::Csv).expect("csv");
        assert_eq!(text, "id,name,parent_id,parent\nt1,\"Errands, misc\",,\n");
    }

    #[test]
    fn batch_summary_lists_failures() {
        let outcome = BatchOutcome {
            succeeded: vec![BatchItem {
                id: "a".into(),
                name: Some("A".into()),
            }],
            failed: vec![BatchFailure {
                id: "b".into(),
                error: "Task not found".into(),
                code: ErrorCode::TaskNotFound,
            }],
            total_succeeded: 1,
            total_failed: 1,
        };
        assert_eq!(
            outcome.text(),
            "succeeded: 1, failed: 1\n  b  error[TASK_NOT_FOUND]: Task not found"
        );
        let (header, rows) = outcome.table();
        assert_eq!(header.len(), rows[0].len());
        assert_eq!(rows[1][1], "failed");
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
