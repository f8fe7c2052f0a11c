use async_trait::async_trait;
use rust_mcp_sdk::macros::{mcp_tool, JsonSchema};
use rust_mcp_sdk::schema::{
    schema_utils::CallToolError, CallToolRequestParams, CallToolResult, ListToolsResult,
    PaginatedRequestParams, RpcError, TextContent,
};
use rust_mcp_sdk::tool_box;
use rust_mcp_sdk::{mcp_server::ServerHandler, McpServer};
use serde::{Deserialize, Serialize};

use taskbridge_core::bridge::Bridge;
use taskbridge_core::executor::ProcessExecutor;
use taskbridge_core::operation::{
    BatchOperation, NewProjectInput, NewTaskInput, PageInput, ProjectQuery, TaskQuery,
    TaskUpdateInput,
};
use taskbridge_core::result::{failure, ErrorRecord, TypedResult};
use taskbridge_core::validate;

pub struct McpContext {
    pub bridge: Bridge<ProcessExecutor>,
}

/// Ids may arrive as a JSON list or as one comma-separated string.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum ListInput {
    String(String),
    List(Vec<String>),
}

/// List items are passed on untouched so malformed ids are rejected, not
/// dropped.
fn parse_list_input(value: Option<ListInput>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(ListInput::List(values)) => values,
        Some(ListInput::String(value)) => parse_list_string(&value),
    }
}

/// Spaces and quotes around each comma-separated item are separator
/// formatting. Empty items are kept.
fn parse_list_string(value: &str) -> Vec<String> {
    let raw = value.trim();
    let inner = raw
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(raw);
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner
        .split(',')
        .map(|item| item.trim().trim_matches('"').to_string())
        .collect()
}

fn ok_text(content: String, is_error: bool) -> Result<CallToolResult, CallToolError> {
    let mut result = CallToolResult::text_content(vec![TextContent::from(content)]);
    if is_error {
        result.is_error = Some(true);
    }
    Ok(result)
}

/// Serializes the full `{success, data, error}` envelope; failures also
/// set the protocol error flag.
fn respond<T: Serialize>(result: TypedResult<T>) -> Result<CallToolResult, CallToolError> {
    let text = serde_json::to_string_pretty(&result).map_err(CallToolError::new)?;
    ok_text(text, !result.is_success())
}

fn with_input<I, T>(
    input: Result<I, ErrorRecord>,
    call: impl FnOnce(I) -> TypedResult<T>,
) -> TypedResult<T> {
    match input {
        Ok(input) => call(input),
        Err(error) => failure(error),
    }
}

fn page_input(limit: Option<i64>, offset: Option<i64>) -> PageInput {
    PageInput { limit, offset }
}

#[mcp_tool(
    name = "status",
    description = "Report whether the host application is running, and its version."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct StatusTool {}

#[mcp_tool(
    name = "list_tasks",
    description = "List tasks with optional filters. Completed tasks are excluded unless include_completed is true. Paginated with limit (default 100, max 1000) and offset."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListTasksTool {
    pub project_id: Option<String>,
    pub tag_id: Option<String>,
    pub flagged: Option<bool>,
    #[serde(default)]
    pub include_completed: bool,
    /// YYYY-MM-DD or YYYY-MM-DDTHH:MM
    pub due_before: Option<String>,
    /// Matched against task name and note.
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[mcp_tool(name = "get_task", description = "Show a single task by id.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct GetTaskTool {
    pub task_id: String,
}

#[mcp_tool(
    name = "create_task",
    description = "Create a task in the inbox, or in a project when project_id is given."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CreateTaskTool {
    pub name: String,
    pub note: Option<String>,
    pub project_id: Option<String>,
    pub tag_ids: Option<ListInput>,
    pub due: Option<String>,
    pub defer: Option<String>,
    #[serde(default)]
    pub flagged: bool,
}

#[mcp_tool(
    name = "update_task",
    description = "Change task fields. Pass \"none\" as due or defer to clear the date."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdateTaskTool {
    pub task_id: String,
    pub name: Option<String>,
    pub note: Option<String>,
    pub flagged: Option<bool>,
    pub due: Option<String>,
    pub defer: Option<String>,
}

#[mcp_tool(name = "complete_task", description = "Mark a task complete.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CompleteTaskTool {
    pub task_id: String,
}

#[mcp_tool(
    name = "defer_task",
    description = "Set a task's defer date to now plus the given number of days."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct DeferTaskTool {
    pub task_id: String,
    pub days: i64,
}

#[mcp_tool(name = "delete_task", description = "Delete a task.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct DeleteTaskTool {
    pub task_id: String,
}

#[mcp_tool(
    name = "list_projects",
    description = "List projects, optionally by folder and status (active, on hold, done, dropped)."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListProjectsTool {
    pub folder_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[mcp_tool(name = "get_project", description = "Show a single project by id.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct GetProjectTool {
    pub project_id: String,
}

#[mcp_tool(name = "create_project", description = "Create a project, optionally inside a folder.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CreateProjectTool {
    pub name: String,
    pub note: Option<String>,
    pub folder_id: Option<String>,
    #[serde(default)]
    pub sequential: bool,
}

#[mcp_tool(name = "complete_project", description = "Mark a project complete.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CompleteProjectTool {
    pub project_id: String,
}

#[mcp_tool(name = "list_tags", description = "List tags.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListTagsTool {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[mcp_tool(name = "create_tag", description = "Create a tag, optionally nested under a parent tag.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CreateTagTool {
    pub name: String,
    pub parent_id: Option<String>,
}

#[mcp_tool(name = "list_folders", description = "List folders.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListFoldersTool {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[mcp_tool(name = "list_perspectives", description = "List perspective names.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListPerspectivesTool {}

#[mcp_tool(
    name = "show_perspective",
    description = "Switch the front window to the named perspective."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ShowPerspectiveTool {
    pub name: String,
}

#[mcp_tool(
    name = "batch_complete",
    description = "Complete many tasks. Per-task failures are reported in the result, not as a call error."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct BatchCompleteTool {
    pub task_ids: ListInput,
}

#[mcp_tool(name = "batch_delete", description = "Delete many tasks.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct BatchDeleteTool {
    pub task_ids: ListInput,
}

#[mcp_tool(
    name = "batch_defer",
    description = "Defer many tasks to now plus the given number of days."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct BatchDeferTool {
    pub task_ids: ListInput,
    pub days: i64,
}

#[mcp_tool(
    name = "batch_update",
    description = "Apply the same field changes to many tasks. Pass \"none\" as due or defer to clear."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct BatchUpdateTool {
    pub task_ids: ListInput,
    pub name: Option<String>,
    pub note: Option<String>,
    pub flagged: Option<bool>,
    pub due: Option<String>,
    pub defer: Option<String>,
}

impl StatusTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        respond(context.bridge.status())
    }
}

impl ListTasksTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let query = TaskQuery {
            project_id: self.project_id.clone(),
            tag_id: self.tag_id.clone(),
            flagged: self.flagged,
            include_completed: self.include_completed,
            due_before: self.due_before.clone(),
            search: self.search.clone(),
        };
        let input = validate::task_filter(&query).and_then(|filter| {
            Ok((filter, validate::validate_page(page_input(self.limit, self.offset))?))
        });
        respond(with_input(input, |(filter, page)| {
            context.bridge.list_tasks(filter, page)
        }))
    }
}

impl GetTaskTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        respond(context.bridge.get_task(&self.task_id))
    }
}

impl CreateTaskTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let input = NewTaskInput {
            name: self.name.clone(),
            note: self.note.clone(),
            project_id: self.project_id.clone(),
            tag_ids: parse_list_input(self.tag_ids.clone()),
            due: self.due.clone(),
            defer: self.defer.clone(),
            flagged: self.flagged,
        };
        respond(with_input(validate::new_task(&input), |task| {
            context.bridge.create_task(task)
        }))
    }
}

impl UpdateTaskTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let input = TaskUpdateInput {
            name: self.name.clone(),
            note: self.note.clone(),
            flagged: self.flagged,
            due: self.due.clone(),
            defer: self.defer.clone(),
        };
        respond(with_input(validate::task_changes(&input), |changes| {
            context.bridge.update_task(&self.task_id, changes)
        }))
    }
}

impl CompleteTaskTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        respond(context.bridge.complete_task(&self.task_id))
    }
}

impl DeferTaskTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        respond(with_input(validate::validate_days(self.days), |days| {
            context.bridge.defer_task(&self.task_id, days)
        }))
    }
}

impl DeleteTaskTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        respond(context.bridge.delete_task(&self.task_id))
    }
}

impl ListProjectsTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let query = ProjectQuery {
            folder_id: self.folder_id.clone(),
            status: self.status.clone(),
        };
        let input = validate::project_filter(&query).and_then(|filter| {
            Ok((filter, validate::validate_page(page_input(self.limit, self.offset))?))
        });
        respond(with_input(input, |(filter, page)| {
            context.bridge.list_projects(filter, page)
        }))
    }
}

impl GetProjectTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        respond(context.bridge.get_project(&self.project_id))
    }
}

impl CreateProjectTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let input = NewProjectInput {
            name: self.name.clone(),
            note: self.note.clone(),
            folder_id: self.folder_id.clone(),
            sequential: self.sequential,
        };
        respond(with_input(validate::new_project(&input), |project| {
            context.bridge.create_project(project)
        }))
    }
}

impl CompleteProjectTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        respond(context.bridge.complete_project(&self.project_id))
    }
}

impl ListTagsTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let input = validate::validate_page(page_input(self.limit, self.offset));
        respond(with_input(input, |page| context.bridge.list_tags(page)))
    }
}

impl CreateTagTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        respond(
            context
                .bridge
                .create_tag(&self.name, self.parent_id.as_deref()),
        )
    }
}

impl ListFoldersTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let input = validate::validate_page(page_input(self.limit, self.offset));
        respond(with_input(input, |page| context.bridge.list_folders(page)))
    }
}

impl ListPerspectivesTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        respond(context.bridge.list_perspectives())
    }
}

impl ShowPerspectiveTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        respond(context.bridge.show_perspective(&self.name))
    }
}

fn run_batch(
    context: &McpContext,
    operation: Result<BatchOperation, ErrorRecord>,
    ids: &ListInput,
) -> Result<CallToolResult, CallToolError> {
    let ids = parse_list_input(Some(ids.clone()));
    respond(with_input(operation, |operation| {
        context.bridge.batch(operation, &ids)
    }))
}

impl BatchCompleteTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        run_batch(context, Ok(BatchOperation::Complete), &self.task_ids)
    }
}

impl BatchDeleteTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        run_batch(context, Ok(BatchOperation::Delete), &self.task_ids)
    }
}

impl BatchDeferTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let operation = validate::validate_days(self.days).map(|days| BatchOperation::Defer { days });
        run_batch(context, operation, &self.task_ids)
    }
}

impl BatchUpdateTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let input = TaskUpdateInput {
            name: self.name.clone(),
            note: self.note.clone(),
            flagged: self.flagged,
            due: self.due.clone(),
            defer: self.defer.clone(),
        };
        let operation = validate::task_changes(&input).map(BatchOperation::Update);
        run_batch(context, operation, &self.task_ids)
    }
}

tool_box!(
    TaskbridgeTools,
    [
        StatusTool,
        ListTasksTool,
        GetTaskTool,
        CreateTaskTool,
        UpdateTaskTool,
        CompleteTaskTool,
        DeferTaskTool,
        DeleteTaskTool,
        ListProjectsTool,
        GetProjectTool,
        CreateProjectTool,
        CompleteProjectTool,
        ListTagsTool,
        CreateTagTool,
        ListFoldersTool,
        ListPerspectivesTool,
        ShowPerspectiveTool,
        BatchCompleteTool,
        BatchDeleteTool,
        BatchDeferTool,
        BatchUpdateTool
    ]
);

pub struct TaskbridgeServerHandler {
    pub context: McpContext,
}

impl TaskbridgeServerHandler {
    fn dispatch(&self, tool: TaskbridgeTools) -> Result<CallToolResult, CallToolError> {
        let context = &self.context;
        match tool {
            TaskbridgeTools::StatusTool(tool) => tool.call(context),
            TaskbridgeTools::ListTasksTool(tool) => tool.call(context),
            TaskbridgeTools::GetTaskTool(tool) => tool.call(context),
            TaskbridgeTools::CreateTaskTool(tool) => tool.call(context),
            TaskbridgeTools::UpdateTaskTool(tool) => tool.call(context),
            TaskbridgeTools::CompleteTaskTool(tool) => tool.call(context),
            TaskbridgeTools::DeferTaskTool(tool) => tool.call(context),
            TaskbridgeTools::DeleteTaskTool(tool) => tool.call(context),
            TaskbridgeTools::ListProjectsTool(tool) => tool.call(context),
            TaskbridgeTools::GetProjectTool(tool) => tool.call(context),
            TaskbridgeTools::CreateProjectTool(tool) => tool.call(context),
            TaskbridgeTools::CompleteProjectTool(tool) => tool.call(context),
            TaskbridgeTools::ListTagsTool(tool) => tool.call(context),
            TaskbridgeTools::CreateTagTool(tool) => tool.call(context),
            TaskbridgeTools::ListFoldersTool(tool) => tool.call(context),
            TaskbridgeTools::ListPerspectivesTool(tool) => tool.call(context),
            TaskbridgeTools::ShowPerspectiveTool(tool) => tool.call(context),
            TaskbridgeTools::BatchCompleteTool(tool) => tool.call(context),
            TaskbridgeTools::BatchDeleteTool(tool) => tool.call(context),
            TaskbridgeTools::BatchDeferTool(tool) => tool.call(context),
            TaskbridgeTools::BatchUpdateTool(tool) => tool.call(context),
        }
    }
}

#[async_trait]
impl ServerHandler for TaskbridgeServerHandler {
    async fn handle_list_tools_request(
        &self,
        _params: Option<PaginatedRequestParams>,
        _runtime: std::sync::Arc<dyn McpServer>,
    ) -> Result<ListToolsResult, RpcError> {
        Ok(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: TaskbridgeTools::tools(),
        })
    }

    async fn handle_call_tool_request(
        &self,
        params: CallToolRequestParams,
        _runtime: std::sync::Arc<dyn McpServer>,
    ) -> Result<CallToolResult, CallToolError> {
        tracing::debug!(tool = %params.name, "tool call");
        let tool = TaskbridgeTools::try_from(params).map_err(CallToolError::new)?;
        // Each call blocks on one interpreter process.
        tokio::task::block_in_place(|| self.dispatch(tool))
    }
}
