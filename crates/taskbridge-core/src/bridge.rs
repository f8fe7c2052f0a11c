use crate::assets::AssetCache;
use crate::batch::{run_batch, BatchItem, BatchOutcome};
use crate::config::{ConfigError, TaskbridgeConfig};
use crate::executor::{ProcessExecutor, RawExecutionResult, ScriptRunner};
use crate::model::{Entity, EntityKind, HostStatus, Page};
use crate::operation::{
    BatchOperation, NewProject, NewTask, Operation, OperationDescriptor, PageRequest,
    ProjectFilter, TaskChanges, TaskFilter,
};
use crate::parser::{parse_entities, parse_entity, parse_output, parse_page};
use crate::result::{failure, success, ErrorCode, ErrorRecord, TypedResult};
use crate::script::{ScriptCompiler, DEFAULT_APPLICATION};
use crate::validate::{
    check_new_project, check_new_task, check_task_changes, check_task_filter, validate_id,
    validate_name, validate_optional_id,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub application: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            application: DEFAULT_APPLICATION.to_string(),
        }
    }
}

/// Early return for a validation step inside a `TypedResult` function.
macro_rules! check {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(error) => return failure(error),
        }
    };
}

/// Entry point used by the CLI and the MCP server. Holds no per-call state.
#[derive(Debug)]
pub struct Bridge<R> {
    runner: R,
    assets: AssetCache,
    settings: BridgeSettings,
}

impl Bridge<ProcessExecutor> {
    pub fn from_config(config: &TaskbridgeConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.build_executor()?,
            config.build_assets(),
            BridgeSettings {
                application: config.application().to_string(),
            },
        ))
    }
}

impl<R: ScriptRunner> Bridge<R> {
    pub fn new(runner: R, assets: AssetCache, settings: BridgeSettings) -> Self {
        Self {
            runner,
            assets,
            settings,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    fn compiler(&self) -> ScriptCompiler<'_> {
        ScriptCompiler::new(&self.assets, &self.settings.application)
    }

    fn execute(&self, operation: Operation) -> Result<RawExecutionResult, ErrorRecord> {
        let script = self.compiler().compile(&OperationDescriptor::new(operation))?;
        tracing::debug!(operation = script.operation, "running script");
        Ok(self.runner.run(&script.text))
    }

    fn entity(&self, operation: Operation, kind: EntityKind) -> TypedResult<Entity> {
        let raw = check!(self.execute(operation));
        parse_entity(raw, kind)
    }

    fn page(&self, operation: Operation, kind: EntityKind) -> TypedResult<Page<Entity>> {
        let raw = check!(self.execute(operation));
        parse_page(raw, kind)
    }

    /// A host that is down is reported as data, not as a failure.
    pub fn status(&self) -> TypedResult<HostStatus> {
        let raw = check!(self.execute(Operation::Status));
        match parse_output(raw) {
            TypedResult::Failure { error } if error.code == ErrorCode::NotRunning => {
                success(HostStatus {
                    running: false,
                    version: None,
                })
            }
            result => result,
        }
    }

    pub fn list_tasks(&self, filter: TaskFilter, page: PageRequest) -> TypedResult<Page<Entity>> {
        check!(check_task_filter(&filter));
        let page = page.clamped();
        self.page(Operation::ListTasks { filter, page }, EntityKind::Task)
    }

    pub fn get_task(&self, id: &str) -> TypedResult<Entity> {
        check!(validate_id("task id", id));
        self.entity(Operation::GetTask { id: id.to_string() }, EntityKind::Task)
    }

    pub fn create_task(&self, task: NewTask) -> TypedResult<Entity> {
        check!(check_new_task(&task));
        self.entity(Operation::CreateTask(task), EntityKind::Task)
    }

    pub fn update_task(&self, id: &str, changes: TaskChanges) -> TypedResult<Entity> {
        check!(validate_id("task id", id));
        check!(check_task_changes(&changes));
        self.entity(
            Operation::UpdateTask {
                id: id.to_string(),
                changes,
            },
            EntityKind::Task,
        )
    }

    pub fn complete_task(&self, id: &str) -> TypedResult<Entity> {
        check!(validate_id("task id", id));
        self.entity(Operation::CompleteTask { id: id.to_string() }, EntityKind::Task)
    }

    /// Sets the defer date to now plus `days`, like the batch variant.
    pub fn defer_task(&self, id: &str, days: u32) -> TypedResult<Entity> {
        check!(validate_id("task id", id));
        check!(positive_days(days));
        self.entity(
            Operation::DeferTask {
                id: id.to_string(),
                days,
            },
            EntityKind::Task,
        )
    }

    pub fn delete_task(&self, id: &str) -> TypedResult<BatchItem> {
        check!(validate_id("task id", id));
        let raw = check!(self.execute(Operation::DeleteTask { id: id.to_string() }));
        parse_output(raw)
    }

    pub fn list_projects(
        &self,
        filter: ProjectFilter,
        page: PageRequest,
    ) -> TypedResult<Page<Entity>> {
        check!(validate_optional_id("folder id", filter.folder_id.as_deref()));
        let page = page.clamped();
        self.page(Operation::ListProjects { filter, page }, EntityKind::Project)
    }

    pub fn get_project(&self, id: &str) -> TypedResult<Entity> {
        check!(validate_id("project id", id));
        self.entity(Operation::GetProject { id: id.to_string() }, EntityKind::Project)
    }

    pub fn create_project(&self, project: NewProject) -> TypedResult<Entity> {
        check!(check_new_project(&project));
        self.entity(Operation::CreateProject(project), EntityKind::Project)
    }

    pub fn complete_project(&self, id: &str) -> TypedResult<Entity> {
        check!(validate_id("project id", id));
        self.entity(
            Operation::CompleteProject { id: id.to_string() },
            EntityKind::Project,
        )
    }

    pub fn list_tags(&self, page: PageRequest) -> TypedResult<Page<Entity>> {
        self.page(Operation::ListTags { page: page.clamped() }, EntityKind::Tag)
    }

    pub fn create_tag(&self, name: &str, parent_id: Option<&str>) -> TypedResult<Entity> {
        let name = check!(validate_name("tag name", name));
        check!(validate_optional_id("parent tag id", parent_id));
        self.entity(
            Operation::CreateTag {
                name,
                parent_id: parent_id.map(str::to_string),
            },
            EntityKind::Tag,
        )
    }

    pub fn list_folders(&self, page: PageRequest) -> TypedResult<Page<Entity>> {
        self.page(
            Operation::ListFolders {
                page: page.clamped(),
            },
            EntityKind::Folder,
        )
    }

    pub fn list_perspectives(&self) -> TypedResult<Vec<Entity>> {
        let raw = check!(self.execute(Operation::ListPerspectives));
        parse_entities(raw, EntityKind::Perspective)
    }

    pub fn show_perspective(&self, name: &str) -> TypedResult<Entity> {
        let name = check!(validate_name("perspective name", name));
        self.entity(Operation::ShowPerspective { name }, EntityKind::Perspective)
    }

    pub fn batch(
        &self,
        operation: BatchOperation,
        ids: &[String],
    ) -> TypedResult<BatchOutcome<BatchItem>> {
        match &operation {
            BatchOperation::Defer { days } => check!(positive_days(*days)),
            BatchOperation::Update(changes) => check!(check_task_changes(changes)),
            BatchOperation::Complete | BatchOperation::Delete => {}
        }
        run_batch(&self.runner, &self.compiler(), &operation, ids)
    }
}

fn positive_days(days: u32) -> Result<(), ErrorRecord> {
    if days == 0 {
        return Err(ErrorRecord::new(
            ErrorCode::ValidationError,
            "days must be a positive integer, got 0",
        ));
    }
    Ok(())
}
