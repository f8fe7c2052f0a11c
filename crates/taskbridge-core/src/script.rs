use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::assets::{AssetCache, APPLICATION_PLACEHOLDER};
use crate::escape::{quote_list, quote_literal};
use crate::operation::{
    BatchOperation, DateChange, NewProject, NewTask, Operation, OperationDescriptor, PageRequest,
    ProjectFilter, TaskChanges, TaskFilter,
};
use crate::result::{failure_message, ErrorRecord};

pub const DEFAULT_APPLICATION: &str = "OmniFocus";

/// Small helpers copied into every script so each one stands alone.
const INLINE_HELPERS: &str = r#"on jsonEscape(theValue)
	set theText to theValue as text
	if theText is "" then return ""
	set codes to id of theText
	if class of codes is not list then set codes to {codes}
	set hexDigits to "0123456789abcdef"
	set out to ""
	repeat with i from 1 to (count of codes)
		set n to item i of codes
		if n is 34 then
			set out to out & "\\\""
		else if n is 92 then
			set out to out & "\\\\"
		else if n is 10 then
			set out to out & "\\n"
		else if n is 13 then
			set out to out & "\\r"
		else if n is 9 then
			set out to out & "\\t"
		else if n < 32 then
			set out to out & "\\u00" & (character ((n div 16) + 1) of hexDigits) & (character ((n mod 16) + 1) of hexDigits)
		else
			set out to out & (character id n)
		end if
	end repeat
	return out
end jsonEscape

on jsonStringOrNull(theValue)
	if theValue is missing value then return "null"
	set theText to theValue as text
	if theText is "" then return "null"
	return "\"" & my jsonEscape(theText) & "\""
end jsonStringOrNull

on pad2(n)
	set n to n as integer
	if n < 10 then return "0" & (n as text)
	return n as text
end pad2

on jsonDateOrNull(theDate)
	if theDate is missing value then return "null"
	set y to (year of theDate) as integer
	set m to (month of theDate) as integer
	set d to (day of theDate) as integer
	set s to (time of theDate) as integer
	set stamp to (y as text) & "-" & my pad2(m) & "-" & my pad2(d)
	set stamp to stamp & "T" & my pad2(s div 3600) & ":" & my pad2((s mod 3600) div 60) & ":" & my pad2(s mod 60)
	return "\"" & stamp & "\""
end jsonDateOrNull

on makeDate(y, m, d, hh, mm, ss)
	set theDate to current date
	set day of theDate to 1
	set year of theDate to y
	set month of theDate to m
	set day of theDate to d
	set time of theDate to (hh * 3600) + (mm * 60) + ss
	return theDate
end makeDate
"#;

#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub operation: &'static str,
    pub text: String,
}

/// Turns descriptors into script text. Fragments come from the borrowed
/// cache; the compiler itself holds no state between calls.
pub struct ScriptCompiler<'a> {
    assets: &'a AssetCache,
    application: String,
}

impl<'a> ScriptCompiler<'a> {
    pub fn new(assets: &'a AssetCache, application: &str) -> Self {
        Self {
            assets,
            application: quote_literal(application),
        }
    }

    pub fn compile(&self, descriptor: &OperationDescriptor) -> Result<CompiledScript, ErrorRecord> {
        let mut text = String::from(INLINE_HELPERS);
        for fragment in &descriptor.fragments {
            let source = match self.assets.get(*fragment) {
                Ok(source) => source,
                Err(err) => return failure_message(err.to_string()).into_result(),
            };
            text.push('\n');
            text.push_str(&source.replace(APPLICATION_PLACEHOLDER, &self.application));
        }
        text.push_str("\non run\n");
        for line in self.body(&descriptor.operation) {
            text.push('\t');
            text.push_str(&line);
            text.push('\n');
        }
        text.push_str("end run\n");
        tracing::debug!(
            operation = descriptor.name(),
            fragments = descriptor.fragments.len(),
            bytes = text.len(),
            "compiled script"
        );
        Ok(CompiledScript {
            operation: descriptor.name(),
            text,
        })
    }

    fn body(&self, operation: &Operation) -> Vec<String> {
        match operation {
            Operation::Status => self.status_body(),
            Operation::ListTasks { filter, page } => self.list_body(
                "flattened tasks",
                "theTask",
                "taskJson",
                task_filter_lines(filter),
                task_filter_preamble(filter),
                page,
            ),
            Operation::GetTask { id } => self.with_task(id, vec!["return my taskJson(theTask)".into()]),
            Operation::CreateTask(task) => self.create_task_body(task),
            Operation::UpdateTask { id, changes } => {
                let mut lines = change_lines("theTask", changes);
                lines.push("return my taskJson(theTask)".into());
                self.with_task(id, lines)
            }
            Operation::CompleteTask { id } => self.with_task(
                id,
                vec![
                    "mark complete theTask".into(),
                    "return my taskJson(theTask)".into(),
                ],
            ),
            Operation::DeferTask { id, days } => {
                let mut lines = vec![defer_base_line(*days)];
                lines.extend(self.with_task(
                    id,
                    vec![
                        "set defer date of theTask to newDefer".into(),
                        "return my taskJson(theTask)".into(),
                    ],
                ));
                lines
            }
            Operation::DeleteTask { id } => self.with_task(
                id,
                vec![
                    "set taskId to id of theTask".into(),
                    "set taskName to name of theTask".into(),
                    "delete theTask".into(),
                    "return my jsonObject({my jsonField(\"id\", my jsonStringOrNull(taskId)), my jsonField(\"name\", my jsonStringOrNull(taskName))})".into(),
                ],
            ),
            Operation::ListProjects { filter, page } => self.list_body(
                "flattened projects",
                "theProject",
                "projectJson",
                project_filter_lines(filter),
                Vec::new(),
                page,
            ),
            Operation::GetProject { id } => self.with_project(id, vec!["return my projectJson(theProject)".into()]),
            Operation::CreateProject(project) => self.create_project_body(project),
            Operation::CompleteProject { id } => self.with_project(
                id,
                vec![
                    "mark complete theProject".into(),
                    "return my projectJson(theProject)".into(),
                ],
            ),
            Operation::ListTags { page } => self.list_body(
                "flattened tags",
                "theTag",
                "tagJson",
                Vec::new(),
                Vec::new(),
                page,
            ),
            Operation::CreateTag { name, parent_id } => self.create_tag_body(name, parent_id.as_deref()),
            Operation::ListFolders { page } => self.list_body(
                "flattened folders",
                "theFolder",
                "folderJson",
                Vec::new(),
                Vec::new(),
                page,
            ),
            Operation::ListPerspectives => self.list_perspectives_body(),
            Operation::ShowPerspective { name } => self.show_perspective_body(name),
            Operation::BatchChunk { operation, ids } => self.batch_body(operation, ids),
        }
    }

    fn tell_document(&self, inner: Vec<String>) -> Vec<String> {
        let mut lines = vec![
            format!("tell application {}", self.application),
            "\ttell default document".to_string(),
        ];
        lines.extend(inner.into_iter().map(|line| format!("\t\t{}", line)));
        lines.push("\tend tell".into());
        lines.push("end tell".into());
        lines
    }

    fn with_task(&self, id: &str, inner: Vec<String>) -> Vec<String> {
        let mut lines = vec![format!(
            "set theTask to first flattened task whose id is {}",
            quote_literal(id)
        )];
        lines.extend(inner);
        self.tell_document(lines)
    }

    fn with_project(&self, id: &str, inner: Vec<String>) -> Vec<String> {
        let mut lines = vec![format!(
            "set theProject to first flattened project whose id is {}",
            quote_literal(id)
        )];
        lines.extend(inner);
        self.tell_document(lines)
    }

    fn status_body(&self) -> Vec<String> {
        vec![
            format!("if application {} is running then", self.application),
            format!("\ttell application {}", self.application),
            "\t\tset appVersion to version".into(),
            "\tend tell".into(),
            "\treturn my jsonObject({my jsonField(\"running\", \"true\"), my jsonField(\"version\", my jsonStringOrNull(appVersion))})".into(),
            "end if".into(),
            "return my jsonObject({my jsonField(\"running\", \"false\"), my jsonField(\"version\", \"null\")})".into(),
        ]
    }

    /// Single pass over `collection`. `totalCount` keeps counting after the
    /// page is full, so `hasMore` is only computed once the scan ends.
    fn list_body(
        &self,
        collection: &str,
        item: &str,
        serializer: &str,
        filters: Vec<String>,
        preamble: Vec<String>,
        page: &PageRequest,
    ) -> Vec<String> {
        let mut lines = vec![
            format!("set pageOffset to {}", page.offset),
            format!("set pageLimit to {}", page.limit),
            "set totalCount to 0".to_string(),
            "set returnedCount to 0".to_string(),
            "set currentIndex to 0".to_string(),
            "set pageItems to {}".to_string(),
        ];
        lines.extend(preamble);

        let mut scan = vec![
            format!("repeat with {} in ({})", item, collection),
            "\tset isMatch to true".to_string(),
        ];
        scan.extend(filters.into_iter().map(|line| format!("\t{}", line)));
        scan.extend([
            "\tif isMatch then".to_string(),
            "\t\tif currentIndex >= pageOffset and returnedCount < pageLimit then".to_string(),
            format!("\t\t\tset end of pageItems to my {}({})", serializer, item),
            "\t\t\tset returnedCount to returnedCount + 1".to_string(),
            "\t\tend if".to_string(),
            "\t\tset currentIndex to currentIndex + 1".to_string(),
            "\t\tset totalCount to totalCount + 1".to_string(),
            "\tend if".to_string(),
            "end repeat".to_string(),
        ]);
        lines.extend(self.tell_document(scan));

        lines.extend([
            "set hasMore to totalCount > (pageOffset + returnedCount)".to_string(),
            "set fields to {}".to_string(),
            "set end of fields to my jsonField(\"items\", my jsonArray(pageItems))".to_string(),
            "set end of fields to my jsonField(\"totalCount\", totalCount as text)".to_string(),
            "set end of fields to my jsonField(\"returnedCount\", returnedCount as text)".to_string(),
            "set end of fields to my jsonField(\"offset\", pageOffset as text)".to_string(),
            "set end of fields to my jsonField(\"limit\", pageLimit as text)".to_string(),
            "set end of fields to my jsonField(\"hasMore\", my jsonBool(hasMore))".to_string(),
            "return my jsonObject(fields)".to_string(),
        ]);
        lines
    }

    fn create_task_body(&self, task: &NewTask) -> Vec<String> {
        let properties = format!("{{name:{}, flagged:{}}}", quote_literal(&task.name), task.flagged);
        let mut inner = Vec::new();
        match &task.project_id {
            Some(project_id) => {
                inner.push(format!(
                    "set theContainer to first flattened project whose id is {}",
                    quote_literal(project_id)
                ));
                inner.push(format!(
                    "set theTask to make new task at end of tasks of theContainer with properties {}",
                    properties
                ));
            }
            None => inner.push(format!(
                "set theTask to make new inbox task with properties {}",
                properties
            )),
        }
        if let Some(note) = &task.note {
            inner.push(format!("set note of theTask to {}", quote_literal(note)));
        }
        if let Some(due) = &task.due {
            inner.push(format!("set due date of theTask to {}", make_date(due)));
        }
        if let Some(defer) = &task.defer {
            inner.push(format!("set defer date of theTask to {}", make_date(defer)));
        }
        for tag_id in &task.tag_ids {
            inner.push(format!(
                "add (first flattened tag whose id is {}) to tags of theTask",
                quote_literal(tag_id)
            ));
        }
        inner.push("return my taskJson(theTask)".into());
        self.tell_document(inner)
    }

    fn create_project_body(&self, project: &NewProject) -> Vec<String> {
        let properties = format!(
            "{{name:{}, sequential:{}}}",
            quote_literal(&project.name),
            project.sequential
        );
        let mut inner = Vec::new();
        match &project.folder_id {
            Some(folder_id) => {
                inner.push(format!(
                    "set theFolder to first flattened folder whose id is {}",
                    quote_literal(folder_id)
                ));
                inner.push(format!(
                    "set theProject to make new project at end of projects of theFolder with properties {}",
                    properties
                ));
            }
            None => inner.push(format!(
                "set theProject to make new project with properties {}",
                properties
            )),
        }
        if let Some(note) = &project.note {
            inner.push(format!("set note of theProject to {}", quote_literal(note)));
        }
        inner.push("return my projectJson(theProject)".into());
        self.tell_document(inner)
    }

    fn create_tag_body(&self, name: &str, parent_id: Option<&str>) -> Vec<String> {
        let properties = format!("{{name:{}}}", quote_literal(name));
        let mut inner = Vec::new();
        match parent_id {
            Some(parent_id) => {
                inner.push(format!(
                    "set theParent to first flattened tag whose id is {}",
                    quote_literal(parent_id)
                ));
                inner.push(format!(
                    "set theTag to make new tag at end of tags of theParent with properties {}",
                    properties
                ));
            }
            None => inner.push(format!("set theTag to make new tag with properties {}", properties)),
        }
        inner.push("return my tagJson(theTag)".into());
        self.tell_document(inner)
    }

    fn list_perspectives_body(&self) -> Vec<String> {
        vec![
            format!("tell application {}", self.application),
            "\tset perspectiveNames to perspective names".into(),
            "end tell".into(),
            "set perspectiveItems to {}".into(),
            "repeat with perspectiveName in perspectiveNames".into(),
            "\tset end of perspectiveItems to my jsonObject({my jsonField(\"name\", my jsonStringOrNull(contents of perspectiveName))})".into(),
            "end repeat".into(),
            "return my jsonArray(perspectiveItems)".into(),
        ]
    }

    fn show_perspective_body(&self, name: &str) -> Vec<String> {
        let quoted = quote_literal(name);
        vec![
            format!("tell application {}", self.application),
            format!("\tif perspective names does not contain {} then", quoted),
            format!("\t\terror \"No perspective named \" & {}", quoted),
            "\tend if".into(),
            format!(
                "\tset perspective name of front document window of default document to {}",
                quoted
            ),
            "end tell".into(),
            format!(
                "return my jsonObject({{my jsonField(\"name\", my jsonStringOrNull({}))}})",
                quoted
            ),
        ]
    }

    /// One chunk: every id is attempted inside its own `try`, so a failing
    /// id never stops the ones after it.
    fn batch_body(&self, operation: &BatchOperation, ids: &[String]) -> Vec<String> {
        let mut lines = vec![
            format!("set idList to {}", quote_list(ids)),
            "set okItems to {}".to_string(),
            "set failItems to {}".to_string(),
        ];
        if let BatchOperation::Defer { days } = operation {
            lines.push(defer_base_line(*days));
        }

        let mut attempt = vec![
            "set theTask to first flattened task whose id is theId".to_string(),
            "set taskName to name of theTask".to_string(),
        ];
        match operation {
            BatchOperation::Complete => attempt.push("mark complete theTask".into()),
            BatchOperation::Delete => attempt.push("delete theTask".into()),
            BatchOperation::Defer { .. } => {
                attempt.push("set defer date of theTask to newDefer".into())
            }
            BatchOperation::Update(changes) => attempt.extend(change_lines("theTask", changes)),
        }
        attempt.push(
            "set end of okItems to my jsonObject({my jsonField(\"id\", my jsonStringOrNull(theId)), my jsonField(\"name\", my jsonStringOrNull(taskName))})"
                .into(),
        );

        let mut scan = vec![
            "repeat with anId in idList".to_string(),
            "\tset theId to contents of anId".to_string(),
            "\ttry".to_string(),
        ];
        scan.extend(attempt.into_iter().map(|line| format!("\t\t{}", line)));
        scan.extend([
            "\ton error errMsg".to_string(),
            "\t\tset end of failItems to my jsonObject({my jsonField(\"id\", my jsonStringOrNull(theId)), my jsonField(\"error\", my jsonStringOrNull(errMsg))})".to_string(),
            "\tend try".to_string(),
            "end repeat".to_string(),
        ]);
        lines.extend(self.tell_document(scan));
        lines.push(
            "return my jsonObject({my jsonField(\"succeeded\", my jsonArray(okItems)), my jsonField(\"failed\", my jsonArray(failItems))})"
                .into(),
        );
        lines
    }
}

/// Both single and batch defer count from the current date.
fn defer_base_line(days: u32) -> String {
    format!("set newDefer to (current date) + ({} * days)", days)
}

fn make_date(value: &NaiveDateTime) -> String {
    format!(
        "my makeDate({}, {}, {}, {}, {}, {})",
        value.year(),
        value.month(),
        value.day(),
        value.hour(),
        value.minute(),
        value.second()
    )
}

fn date_change_line(target: &str, property: &str, change: &DateChange) -> String {
    match change {
        DateChange::Set(value) => format!("set {} of {} to {}", property, target, make_date(value)),
        DateChange::Clear => format!("set {} of {} to missing value", property, target),
    }
}

fn change_lines(target: &str, changes: &TaskChanges) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(name) = &changes.name {
        lines.push(format!("set name of {} to {}", target, quote_literal(name)));
    }
    if let Some(note) = &changes.note {
        lines.push(format!("set note of {} to {}", target, quote_literal(note)));
    }
    if let Some(flagged) = changes.flagged {
        lines.push(format!("set flagged of {} to {}", target, flagged));
    }
    if let Some(due) = &changes.due {
        lines.push(date_change_line(target, "due date", due));
    }
    if let Some(defer) = &changes.defer {
        lines.push(date_change_line(target, "defer date", defer));
    }
    lines
}

fn task_filter_preamble(filter: &TaskFilter) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(cutoff) = &filter.due_before {
        lines.push(format!("set dueCutoff to {}", make_date(cutoff)));
    }
    if let Some(search) = &filter.search {
        lines.push(format!("set searchText to {}", quote_literal(search)));
    }
    lines
}

/// Only filters that are set produce script text.
fn task_filter_lines(filter: &TaskFilter) -> Vec<String> {
    let mut lines = Vec::new();
    if !filter.include_completed {
        lines.extend(guarded(vec![
            "if completed of theTask then set isMatch to false".into(),
        ]));
    }
    if let Some(flagged) = filter.flagged {
        let check = if flagged {
            "if flagged of theTask is false then set isMatch to false"
        } else {
            "if flagged of theTask then set isMatch to false"
        };
        lines.extend(guarded(vec![check.to_string()]));
    }
    if let Some(project_id) = &filter.project_id {
        lines.extend(guarded(vec![
            "set theProject to containing project of theTask".into(),
            "if theProject is missing value then".into(),
            "\tset isMatch to false".into(),
            format!("else if id of theProject is not {} then", quote_literal(project_id)),
            "\tset isMatch to false".into(),
            "end if".into(),
        ]));
    }
    if let Some(tag_id) = &filter.tag_id {
        lines.extend(guarded(vec![format!(
            "if (id of every tag of theTask) does not contain {} then set isMatch to false",
            quote_literal(tag_id)
        )]));
    }
    if filter.due_before.is_some() {
        lines.extend(guarded(vec![
            "set taskDue to due date of theTask".into(),
            "if taskDue is missing value then".into(),
            "\tset isMatch to false".into(),
            "else if taskDue is not less than dueCutoff then".into(),
            "\tset isMatch to false".into(),
            "end if".into(),
        ]));
    }
    if filter.search.is_some() {
        lines.extend(guarded(vec![
            "set taskNote to note of theTask".into(),
            "if taskNote is missing value then set taskNote to \"\"".into(),
            "if (name of theTask) does not contain searchText and taskNote does not contain searchText then set isMatch to false".into(),
        ]));
    }
    lines
}

fn project_filter_lines(filter: &ProjectFilter) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(folder_id) = &filter.folder_id {
        lines.extend(guarded(vec![
            "set folderMatch to false".into(),
            "try".into(),
            format!(
                "\tif id of (folder of theProject) is {} then set folderMatch to true",
                quote_literal(folder_id)
            ),
            "end try".into(),
            "if not folderMatch then set isMatch to false".into(),
        ]));
    }
    if let Some(status) = &filter.status {
        lines.extend(guarded(vec![format!(
            "if status of theProject is not {} then set isMatch to false",
            status.host_constant()
        )]));
    }
    lines
}

fn guarded(inner: Vec<String>) -> Vec<String> {
    let mut lines = vec!["if isMatch then".to_string()];
    lines.extend(inner.into_iter().map(|line| format!("\t{}", line)));
    lines.push("end if".into());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Fragment;
    use chrono::NaiveDate;

    fn compile(operation: Operation) -> String {
        let cache = AssetCache::embedded();
        let compiler = ScriptCompiler::new(&cache, DEFAULT_APPLICATION);
        compiler
            .compile(&OperationDescriptor::new(operation))
            .expect("compile")
            .text
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(9, 30, 0))
            .expect("date")
    }

    #[test]
    fn every_script_carries_inline_helpers_and_a_run_handler() {
        let text = compile(Operation::Status);
        assert!(text.starts_with("on jsonEscape(theValue)"));
        assert!(text.contains("on jsonStringOrNull(theValue)"));
        assert!(text.contains("\non run\n"));
        assert!(text.ends_with("end run\n"));
        assert!(!text.contains(APPLICATION_PLACEHOLDER));
    }

    #[test]
    fn json_escape_walks_code_points_not_characters() {
        let text = compile(Operation::Status);
        let helper = &text[..text.find("end jsonEscape").expect("helper end")];
        // CRLF and emoji sequences are single characters with list ids.
        assert!(helper.contains("set codes to id of theText"));
        assert!(helper.contains("if class of codes is not list then set codes to {codes}"));
        assert!(helper.contains("set n to item i of codes"));
        assert!(helper.contains("character id n"));
        assert!(!helper.contains("characters of theText"));
    }

    #[test]
    fn unreadable_fragment_is_an_unknown_error() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        std::fs::write(temp.path().join("json_encode.applescript"), [0xff, 0xfe, 0x00])
            .expect("write");
        let cache = AssetCache::with_override_dir(temp.path());
        let compiler = ScriptCompiler::new(&cache, DEFAULT_APPLICATION);
        let error = compiler
            .compile(&OperationDescriptor::new(Operation::Status))
            .expect_err("bad fragment");
        assert_eq!(error.code, crate::result::ErrorCode::UnknownError);
        assert!(error.message.contains("json_encode"));
    }

    #[test]
    fn composed_scripts_include_requested_fragments_only() {
        let text = compile(Operation::GetTask { id: "abc".into() });
        assert!(text.contains("on taskJson(theTask)"));
        assert!(text.contains("on joinList("));
        assert!(!text.contains("on projectJson("));
        assert!(text.contains("tell application \"OmniFocus\""));
        assert!(text.contains("first flattened task whose id is \"abc\""));
    }

    #[test]
    fn application_name_is_escaped() {
        let cache = AssetCache::embedded();
        let compiler = ScriptCompiler::new(&cache, "Omni\"Focus");
        let text = compiler
            .compile(&OperationDescriptor::new(Operation::GetTask { id: "a".into() }))
            .expect("compile")
            .text;
        assert!(text.contains("tell application \"Omni\\\"Focus\""));
    }

    #[test]
    fn unset_filters_emit_no_text() {
        let text = compile(Operation::ListTasks {
            filter: TaskFilter {
                include_completed: true,
                ..Default::default()
            },
            page: PageRequest::default(),
        });
        for needle in [
            "if completed of theTask then",
            "else if id of theProject is not",
            "if flagged of theTask",
            "every tag of theTask",
            "dueCutoff",
            "searchText",
        ] {
            assert!(!text.contains(needle), "unexpected {:?}", needle);
        }
        assert_eq!(text.matches("if isMatch then").count(), 1);
    }

    #[test]
    fn set_filters_emit_checks_with_escaped_values() {
        let text = compile(Operation::ListTasks {
            filter: TaskFilter {
                project_id: Some("proj1".into()),
                tag_id: Some("tag1".into()),
                flagged: Some(true),
                include_completed: false,
                due_before: Some(at(2026, 5, 1)),
                search: Some("milk & eggs".into()),
            },
            page: PageRequest { limit: 25, offset: 50 },
        });
        assert!(text.contains("if completed of theTask then set isMatch to false"));
        assert!(text.contains("if flagged of theTask is false then set isMatch to false"));
        assert!(text.contains("else if id of theProject is not \"proj1\" then"));
        assert!(text.contains("does not contain \"tag1\" then"));
        assert!(text.contains("set dueCutoff to my makeDate(2026, 5, 1, 9, 30, 0)"));
        assert!(text.contains("set searchText to \"milk & eggs\""));
        assert!(text.contains("set pageOffset to 50"));
        assert!(text.contains("set pageLimit to 25"));
        assert!(text.contains("set hasMore to totalCount > (pageOffset + returnedCount)"));
    }

    #[test]
    fn page_window_check_follows_the_counters() {
        let text = compile(Operation::ListTags { page: PageRequest::default() });
        let window = text
            .find("if currentIndex >= pageOffset and returnedCount < pageLimit then")
            .expect("window");
        let has_more = text.find("set hasMore to").expect("hasMore");
        let end_repeat = text.rfind("end repeat").expect("end repeat");
        assert!(window < end_repeat);
        assert!(has_more > end_repeat);
    }

    #[test]
    fn project_filters() {
        let text = compile(Operation::ListProjects {
            filter: ProjectFilter {
                folder_id: Some("f1".into()),
                status: Some(crate::operation::ProjectStatus::OnHold),
            },
            page: PageRequest::default(),
        });
        assert!(text.contains("if id of (folder of theProject) is \"f1\" then set folderMatch to true"));
        assert!(text.contains("if status of theProject is not on hold status then"));
        assert!(text.contains("on projectJson("));
    }

    #[test]
    fn create_task_sets_only_given_fields() {
        let text = compile(Operation::CreateTask(NewTask {
            name: "Call \"Bob\"".into(),
            note: None,
            project_id: None,
            tag_ids: vec!["t1".into(), "t2".into()],
            due: Some(at(2026, 1, 31)),
            defer: None,
            flagged: true,
        }));
        assert!(text.contains(
            "make new inbox task with properties {name:\"Call \\\"Bob\\\"\", flagged:true}"
        ));
        assert!(text.contains("set due date of theTask to my makeDate(2026, 1, 31, 9, 30, 0)"));
        assert!(!text.contains("set defer date of theTask"));
        assert!(!text.contains("set note of theTask"));
        assert_eq!(text.matches("to tags of theTask").count(), 2);
    }

    #[test]
    fn update_clears_dates_with_missing_value() {
        let text = compile(Operation::UpdateTask {
            id: "abc".into(),
            changes: TaskChanges {
                due: Some(DateChange::Clear),
                flagged: Some(false),
                ..Default::default()
            },
        });
        assert!(text.contains("set due date of theTask to missing value"));
        assert!(text.contains("set flagged of theTask to false"));
        assert!(!text.contains("set name of theTask"));
    }

    #[test]
    fn single_and_batch_defer_share_the_current_date_base() {
        let single = compile(Operation::DeferTask { id: "a".into(), days: 3 });
        let batch = compile(Operation::BatchChunk {
            operation: BatchOperation::Defer { days: 3 },
            ids: vec!["a".into()],
        });
        let base = "set newDefer to (current date) + (3 * days)";
        assert!(single.contains(base));
        assert!(batch.contains(base));
    }

    #[test]
    fn batch_chunk_loops_ids_inside_try() {
        let text = compile(Operation::BatchChunk {
            operation: BatchOperation::Complete,
            ids: vec!["a1".into(), "b2".into()],
        });
        assert!(text.contains("set idList to {\"a1\", \"b2\"}"));
        let try_at = text.find("\ttry\n").expect("try");
        let op_at = text.find("mark complete theTask").expect("op");
        let on_error = text.find("on error errMsg").expect("on error");
        assert!(try_at < op_at && op_at < on_error);
        assert!(text.contains("jsonField(\"succeeded\""));
        assert!(text.contains("jsonField(\"failed\""));
    }

    #[test]
    fn show_perspective_raises_a_not_found_phrase() {
        let text = compile(Operation::ShowPerspective { name: "Forecast".into() });
        assert!(text.contains("if perspective names does not contain \"Forecast\" then"));
        assert!(text.contains("error \"No perspective named \" & \"Forecast\""));
    }

    #[test]
    fn every_fragment_is_reachable_from_some_operation() {
        let operations = vec![
            Operation::ListTasks { filter: TaskFilter::default(), page: PageRequest::default() },
            Operation::ListProjects { filter: ProjectFilter::default(), page: PageRequest::default() },
            Operation::ListTags { page: PageRequest::default() },
            Operation::ListFolders { page: PageRequest::default() },
        ];
        let used: std::collections::HashSet<Fragment> =
            operations.iter().flat_map(|op| op.fragments()).collect();
        for fragment in Fragment::ALL {
            assert!(used.contains(&fragment), "{:?}", fragment);
        }
    }
}
