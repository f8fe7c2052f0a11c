use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::operation::{
    DateChange, NewProject, NewProjectInput, NewTask, NewTaskInput, PageInput, PageRequest,
    ProjectFilter, ProjectQuery, ProjectStatus, TaskChanges, TaskFilter, TaskQuery,
    TaskUpdateInput, DEFAULT_LIMIT, MAX_LIMIT,
};
use crate::result::{ErrorCode, ErrorRecord};

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("regex"))
}

pub fn validate_id(field: &str, value: &str) -> Result<(), ErrorRecord> {
    if id_pattern().is_match(value) {
        return Ok(());
    }
    Err(ErrorRecord::new(
        ErrorCode::InvalidIdFormat,
        format!("Invalid {} format: {:?}", field, value),
    ))
}

pub fn validate_optional_id(field: &str, value: Option<&str>) -> Result<(), ErrorRecord> {
    match value {
        Some(value) => validate_id(field, value),
        None => Ok(()),
    }
}

/// Validates every id before returning, then drops repeats (first wins).
pub fn validate_ids(field: &str, values: &[String]) -> Result<Vec<String>, ErrorRecord> {
    for value in values {
        validate_id(field, value)?;
    }
    let mut seen = HashSet::new();
    Ok(values
        .iter()
        .filter(|value| seen.insert(value.as_str()))
        .cloned()
        .collect())
}

/// Free text is safe once escaped; quotes and backslashes are still refused.
pub fn validate_text(field: &str, value: &str) -> Result<(), ErrorRecord> {
    if value.contains('"') || value.contains('\\') {
        return Err(ErrorRecord::new(
            ErrorCode::ValidationError,
            format!("{} must not contain double quotes or backslashes", field),
        ));
    }
    Ok(())
}

pub fn validate_name(field: &str, value: &str) -> Result<String, ErrorRecord> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ErrorRecord::new(
            ErrorCode::ValidationError,
            format!("{} must not be empty", field),
        ));
    }
    validate_text(field, trimmed)?;
    Ok(trimmed.to_string())
}

fn validate_optional_text(field: &str, value: Option<&str>) -> Result<Option<String>, ErrorRecord> {
    match value {
        Some(value) => {
            validate_text(field, value)?;
            Ok(Some(value.to_string()))
        }
        None => Ok(None),
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM` and `YYYY-MM-DDTHH:MM:SS`
/// (a space also works as separator). Bare dates mean midnight.
pub fn validate_date(field: &str, value: &str) -> Result<NaiveDateTime, ErrorRecord> {
    validate_text(field, value)?;
    let trimmed = value.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(parsed) = date.and_hms_opt(0, 0, 0) {
            return Ok(parsed);
        }
    }
    Err(ErrorRecord::new(
        ErrorCode::InvalidDateFormat,
        format!("Invalid {} date: {:?} (expected YYYY-MM-DD[THH:MM])", field, value),
    ))
}

fn validate_optional_date(
    field: &str,
    value: Option<&str>,
) -> Result<Option<NaiveDateTime>, ErrorRecord> {
    value.map(|value| validate_date(field, value)).transpose()
}

/// Like [`validate_date`], but `none` (or an empty string) clears the date.
pub fn validate_date_change(field: &str, value: &str) -> Result<DateChange, ErrorRecord> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(DateChange::Clear);
    }
    validate_date(field, trimmed).map(DateChange::Set)
}

/// Defer offsets are whole days counted from now; zero would be a no-op.
pub fn validate_days(days: i64) -> Result<u32, ErrorRecord> {
    if days < 1 {
        return Err(ErrorRecord::new(
            ErrorCode::ValidationError,
            format!("days must be a positive integer, got {}", days),
        ));
    }
    u32::try_from(days).map_err(|_| {
        ErrorRecord::new(ErrorCode::ValidationError, format!("days is too large: {}", days))
    })
}

pub fn validate_page(input: PageInput) -> Result<PageRequest, ErrorRecord> {
    let limit = input.limit.unwrap_or(i64::from(DEFAULT_LIMIT));
    let offset = input.offset.unwrap_or(0);
    if limit < 0 {
        return Err(ErrorRecord::new(
            ErrorCode::ValidationError,
            format!("limit must be a non-negative integer, got {}", limit),
        ));
    }
    if offset < 0 {
        return Err(ErrorRecord::new(
            ErrorCode::ValidationError,
            format!("offset must be a non-negative integer, got {}", offset),
        ));
    }
    let offset = u32::try_from(offset).map_err(|_| {
        ErrorRecord::new(
            ErrorCode::ValidationError,
            format!("offset is too large: {}", offset),
        )
    })?;
    Ok(PageRequest {
        limit: limit.min(i64::from(MAX_LIMIT)) as u32,
        offset,
    })
}

pub fn task_filter(query: &TaskQuery) -> Result<TaskFilter, ErrorRecord> {
    validate_optional_id("project id", query.project_id.as_deref())?;
    validate_optional_id("tag id", query.tag_id.as_deref())?;
    let search = validate_optional_text("search", query.search.as_deref())?
        .map(|search| search.trim().to_string())
        .filter(|search| !search.is_empty());
    Ok(TaskFilter {
        project_id: query.project_id.clone(),
        tag_id: query.tag_id.clone(),
        flagged: query.flagged,
        include_completed: query.include_completed,
        due_before: validate_optional_date("due_before", query.due_before.as_deref())?,
        search,
    })
}

pub fn project_filter(query: &ProjectQuery) -> Result<ProjectFilter, ErrorRecord> {
    validate_optional_id("folder id", query.folder_id.as_deref())?;
    let status = match query.status.as_deref() {
        Some(value) => Some(ProjectStatus::parse(value).ok_or_else(|| {
            ErrorRecord::new(
                ErrorCode::ValidationError,
                format!(
                    "Unknown project status {:?} (expected active, on hold, done, dropped)",
                    value
                ),
            )
        })?),
        None => None,
    };
    Ok(ProjectFilter {
        folder_id: query.folder_id.clone(),
        status,
    })
}

pub fn new_task(input: &NewTaskInput) -> Result<NewTask, ErrorRecord> {
    let name = validate_name("name", &input.name)?;
    validate_optional_id("project id", input.project_id.as_deref())?;
    let tag_ids = validate_ids("tag id", &input.tag_ids)?;
    Ok(NewTask {
        name,
        note: validate_optional_text("note", input.note.as_deref())?,
        project_id: input.project_id.clone(),
        tag_ids,
        due: validate_optional_date("due", input.due.as_deref())?,
        defer: validate_optional_date("defer", input.defer.as_deref())?,
        flagged: input.flagged,
    })
}

pub fn task_changes(input: &TaskUpdateInput) -> Result<TaskChanges, ErrorRecord> {
    let name = match input.name.as_deref() {
        Some(name) => Some(validate_name("name", name)?),
        None => None,
    };
    let changes = TaskChanges {
        name,
        note: validate_optional_text("note", input.note.as_deref())?,
        flagged: input.flagged,
        due: input
            .due
            .as_deref()
            .map(|value| validate_date_change("due", value))
            .transpose()?,
        defer: input
            .defer
            .as_deref()
            .map(|value| validate_date_change("defer", value))
            .transpose()?,
    };
    if changes.is_empty() {
        return Err(ErrorRecord::new(
            ErrorCode::ValidationError,
            "No changes requested",
        ));
    }
    Ok(changes)
}

pub fn new_project(input: &NewProjectInput) -> Result<NewProject, ErrorRecord> {
    let name = validate_name("name", &input.name)?;
    validate_optional_id("folder id", input.folder_id.as_deref())?;
    Ok(NewProject {
        name,
        note: validate_optional_text("note", input.note.as_deref())?,
        folder_id: input.folder_id.clone(),
        sequential: input.sequential,
    })
}

/// Re-checks a request that was built directly instead of through [`new_task`].
pub fn check_new_task(task: &NewTask) -> Result<(), ErrorRecord> {
    validate_name("name", &task.name)?;
    validate_optional_text("note", task.note.as_deref())?;
    validate_optional_id("project id", task.project_id.as_deref())?;
    for tag_id in &task.tag_ids {
        validate_id("tag id", tag_id)?;
    }
    Ok(())
}

pub fn check_task_changes(changes: &TaskChanges) -> Result<(), ErrorRecord> {
    if changes.is_empty() {
        return Err(ErrorRecord::new(
            ErrorCode::ValidationError,
            "No changes requested",
        ));
    }
    if let Some(name) = changes.name.as_deref() {
        validate_name("name", name)?;
    }
    validate_optional_text("note", changes.note.as_deref())?;
    Ok(())
}

pub fn check_task_filter(filter: &TaskFilter) -> Result<(), ErrorRecord> {
    validate_optional_id("project id", filter.project_id.as_deref())?;
    validate_optional_id("tag id", filter.tag_id.as_deref())?;
    validate_optional_text("search", filter.search.as_deref())?;
    Ok(())
}

pub fn check_new_project(project: &NewProject) -> Result<(), ErrorRecord> {
    validate_name("name", &project.name)?;
    validate_optional_text("note", project.note.as_deref())?;
    validate_optional_id("folder id", project.folder_id.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn ids_accept_only_the_safe_alphabet() {
        for good in ["abc", "A1_b-2", "jK3-9xYz_", "0"] {
            assert!(validate_id("task id", good).is_ok(), "{}", good);
        }
        for bad in [
            "", " ", "a b", "a.b", "a/b", "a\\b", "a\"b", "a'b", "a\nb", "a\u{0}b", "é", "../x",
        ] {
            let err = validate_id("task id", bad).expect_err(bad);
            assert_eq!(err.code, ErrorCode::InvalidIdFormat);
        }
    }

    #[test]
    fn validate_ids_rejects_whole_list_and_dedupes() {
        let ids = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(validate_ids("task id", &ids).expect("ok"), vec!["a", "b"]);

        let bad = vec!["a".to_string(), "b c".to_string()];
        let err = validate_ids("task id", &bad).expect_err("bad");
        assert_eq!(err.code, ErrorCode::InvalidIdFormat);
    }

    #[test]
    fn text_rejects_quotes_and_backslashes_only() {
        assert!(validate_text("name", "Buy milk & eggs; 'now' \n\t ✓").is_ok());
        assert_eq!(
            validate_text("name", "say \"hi\"").expect_err("quote").code,
            ErrorCode::ValidationError
        );
        assert_eq!(
            validate_text("name", "C:\\temp").expect_err("backslash").code,
            ErrorCode::ValidationError
        );
    }

    #[test]
    fn dates_parse_iso_forms() {
        let date = validate_date("due", "2026-03-01").expect("date");
        assert_eq!(date.hour(), 0);
        let date = validate_date("due", "2026-03-01T17:30").expect("datetime");
        assert_eq!((date.hour(), date.minute()), (17, 30));
        assert_eq!(
            validate_date("due", "next friday").expect_err("natural").code,
            ErrorCode::InvalidDateFormat
        );
        assert_eq!(
            validate_date("due", "2026-02-30").expect_err("impossible").code,
            ErrorCode::InvalidDateFormat
        );
    }

    #[test]
    fn date_change_none_clears() {
        assert_eq!(validate_date_change("due", "none").expect("clear"), DateChange::Clear);
        assert!(matches!(
            validate_date_change("due", "2026-01-02").expect("set"),
            DateChange::Set(_)
        ));
    }

    #[test]
    fn page_rejects_negatives_and_caps_limit() {
        let page = validate_page(PageInput::default()).expect("default");
        assert_eq!(page, PageRequest { limit: DEFAULT_LIMIT, offset: 0 });

        let page = validate_page(PageInput {
            limit: Some(50_000),
            offset: Some(10),
        })
        .expect("capped");
        assert_eq!(page.limit, MAX_LIMIT);
        assert_eq!(page.offset, 10);

        for input in [
            PageInput { limit: Some(-1), offset: None },
            PageInput { limit: None, offset: Some(-5) },
        ] {
            assert_eq!(
                validate_page(input).expect_err("negative").code,
                ErrorCode::ValidationError
            );
        }
    }

    #[test]
    fn days_must_be_positive() {
        assert_eq!(validate_days(3).expect("days"), 3);
        assert!(validate_days(0).is_err());
        assert!(validate_days(-2).is_err());
    }

    #[test]
    fn task_changes_require_something() {
        let err = task_changes(&TaskUpdateInput::default()).expect_err("empty");
        assert_eq!(err.code, ErrorCode::ValidationError);

        let changes = task_changes(&TaskUpdateInput {
            flagged: Some(true),
            due: Some("none".to_string()),
            ..Default::default()
        })
        .expect("changes");
        assert_eq!(changes.flagged, Some(true));
        assert_eq!(changes.due, Some(DateChange::Clear));
    }

    #[test]
    fn project_status_names() {
        let filter = project_filter(&ProjectQuery {
            folder_id: None,
            status: Some("on-hold".to_string()),
        })
        .expect("filter");
        assert_eq!(filter.status, Some(ProjectStatus::OnHold));
        assert!(project_filter(&ProjectQuery {
            folder_id: None,
            status: Some("paused".to_string()),
        })
        .is_err());
    }
}
