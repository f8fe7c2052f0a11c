mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use taskbridge_core::bridge::Bridge;
use taskbridge_core::config::load_config;
use taskbridge_core::executor::ProcessExecutor;
use taskbridge_core::operation::{
    BatchOperation, NewProjectInput, NewTaskInput, PageInput, ProjectQuery, TaskChanges,
    TaskQuery, TaskUpdateInput,
};
use taskbridge_core::result::{failure, ErrorRecord, TypedResult};
use taskbridge_core::validate;
use taskbridge_render::OutputFormat;

use crate::output::{emit, emit_batch, EXIT_FAILURE};

#[derive(Parser)]
#[command(name = "taskbridge", version, about = "Drive OmniFocus through its scripting interface")]
struct Cli {
    /// Config file (defaults to $TASKBRIDGE_HOME/config.toml or ~/.taskbridge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output format: text, json or csv
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Report whether the host application is running
    Status,
    /// Task commands
    Tasks {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Project commands
    Projects {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Tag commands
    Tags {
        #[command(subcommand)]
        command: TagCommand,
    },
    /// Folder commands
    Folders {
        #[command(subcommand)]
        command: FolderCommand,
    },
    /// Perspective commands
    Perspectives {
        #[command(subcommand)]
        command: PerspectiveCommand,
    },
    /// Apply one operation to many tasks
    Batch {
        #[command(subcommand)]
        command: BatchCommand,
    },
    /// Print version information
    Version,
}

#[derive(Args)]
struct PageArgs {
    #[arg(long, allow_hyphen_values = true)]
    limit: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<i64>,
}

impl PageArgs {
    fn input(&self) -> PageInput {
        PageInput {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Subcommand)]
enum TaskCommand {
    /// List tasks (completed tasks are hidden unless --all)
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, conflicts_with = "unflagged")]
        flagged: bool,
        #[arg(long)]
        unflagged: bool,
        /// Include completed tasks
        #[arg(long)]
        all: bool,
        /// Only tasks due before this date (YYYY-MM-DD[THH:MM])
        #[arg(long)]
        due_before: Option<String>,
        /// Match against name and note
        #[arg(long)]
        search: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one task
    Show { id: String },
    /// Create a task (in the inbox unless --project is given)
    Add {
        name: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        project: Option<String>,
        /// Tag id; repeat or separate with commas
        #[arg(long = "tag", value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        defer: Option<String>,
        #[arg(long)]
        flagged: bool,
    },
    /// Change task fields; `none` clears a date
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, conflicts_with = "unflag")]
        flag: bool,
        #[arg(long)]
        unflag: bool,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        defer: Option<String>,
    },
    /// Mark a task complete
    Complete { id: String },
    /// Defer a task by a number of days from now
    Defer {
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        days: i64,
    },
    /// Delete a task
    Delete { id: String },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// List projects
    List {
        #[arg(long)]
        folder: Option<String>,
        /// active, on hold, done or dropped
        #[arg(long)]
        status: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one project
    Show { id: String },
    /// Create a project
    Add {
        name: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        folder: Option<String>,
        #[arg(long)]
        sequential: bool,
    },
    /// Mark a project complete
    Complete { id: String },
}

#[derive(Subcommand)]
enum TagCommand {
    /// List tags
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Create a tag
    Add {
        name: String,
        #[arg(long)]
        parent: Option<String>,
    },
}

#[derive(Subcommand)]
enum FolderCommand {
    /// List folders
    List {
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
enum PerspectiveCommand {
    /// List perspective names
    List,
    /// Switch the front window to a perspective
    Show { name: String },
}

#[derive(Subcommand)]
enum BatchCommand {
    /// Complete tasks
    Complete {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,
    },
    /// Delete tasks
    Delete {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,
    },
    /// Defer tasks by a number of days from now
    Defer {
        #[arg(long, allow_hyphen_values = true)]
        days: i64,
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,
    },
    /// Flag tasks
    Flag {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,
    },
    /// Remove the flag from tasks
    Unflag {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TASKBRIDGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Runs `call` with validated input, or reports the validation failure
/// without touching the host.
fn with_input<I, T>(
    input: Result<I, ErrorRecord>,
    call: impl FnOnce(I) -> TypedResult<T>,
) -> TypedResult<T> {
    match input {
        Ok(input) => call(input),
        Err(error) => failure(error),
    }
}

fn flag_choice(set: bool, unset: bool) -> Option<bool> {
    match (set, unset) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

fn print_version() -> ExitCode {
    println!("taskbridge {}", taskbridge_core::version());
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = match cli.command {
        Some(Command::Version) => return Ok(print_version()),
        Some(command) => command,
        None => {
            Cli::command().print_help()?;
            println!();
            return Ok(ExitCode::SUCCESS);
        }
    };

    let config = load_config(cli.config.as_deref()).context("failed to load config")?;
    let bridge = Bridge::from_config(&config).context("invalid config")?;
    tracing::debug!(
        application = config.application(),
        interpreter = config.interpreter(),
        "bridge ready"
    );
    dispatch(&bridge, command, cli.format)
}

fn dispatch(bridge: &Bridge<ProcessExecutor>, command: Command, format: OutputFormat) -> Result<ExitCode> {
    match command {
        Command::Status => emit(&bridge.status(), format),
        Command::Tasks { command } => tasks(bridge, command, format),
        Command::Projects { command } => projects(bridge, command, format),
        Command::Tags { command } => match command {
            TagCommand::List { page } => emit(
                &with_input(validate::validate_page(page.input()), |page| bridge.list_tags(page)),
                format,
            ),
            TagCommand::Add { name, parent } => {
                emit(&bridge.create_tag(&name, parent.as_deref()), format)
            }
        },
        Command::Folders { command } => match command {
            FolderCommand::List { page } => emit(
                &with_input(validate::validate_page(page.input()), |page| {
                    bridge.list_folders(page)
                }),
                format,
            ),
        },
        Command::Perspectives { command } => match command {
            PerspectiveCommand::List => emit(&bridge.list_perspectives(), format),
            PerspectiveCommand::Show { name } => emit(&bridge.show_perspective(&name), format),
        },
        Command::Batch { command } => {
            let (operation, ids) = match command {
                BatchCommand::Complete { ids } => (Ok(BatchOperation::Complete), ids),
                BatchCommand::Delete { ids } => (Ok(BatchOperation::Delete), ids),
                BatchCommand::Defer { days, ids } => (
                    validate::validate_days(days).map(|days| BatchOperation::Defer { days }),
                    ids,
                ),
                BatchCommand::Flag { ids } => (Ok(flag_update(true)), ids),
                BatchCommand::Unflag { ids } => (Ok(flag_update(false)), ids),
            };
            emit_batch(
                &with_input(operation, |operation| bridge.batch(operation, &ids)),
                format,
            )
        }
        Command::Version => Ok(print_version()),
    }
}

fn flag_update(flagged: bool) -> BatchOperation {
    BatchOperation::Update(TaskChanges {
        flagged: Some(flagged),
        ..Default::default()
    })
}

fn tasks(bridge: &Bridge<ProcessExecutor>, command: TaskCommand, format: OutputFormat) -> Result<ExitCode> {
    match command {
        TaskCommand::List {
            project,
            tag,
            flagged,
            unflagged,
            all,
            due_before,
            search,
            page,
        } => {
            let query = TaskQuery {
                project_id: project,
                tag_id: tag,
                flagged: flag_choice(flagged, unflagged),
                include_completed: all,
                due_before,
                search,
            };
            let input = validate::task_filter(&query)
                .and_then(|filter| Ok((filter, validate::validate_page(page.input())?)));
            emit(
                &with_input(input, |(filter, page)| bridge.list_tasks(filter, page)),
                format,
            )
        }
        TaskCommand::Show { id } => emit(&bridge.get_task(&id), format),
        TaskCommand::Add {
            name,
            note,
            project,
            tags,
            due,
            defer,
            flagged,
        } => {
            let input = NewTaskInput {
                name,
                note,
                project_id: project,
                tag_ids: tags,
                due,
                defer,
                flagged,
            };
            emit(
                &with_input(validate::new_task(&input), |task| bridge.create_task(task)),
                format,
            )
        }
        TaskCommand::Update {
            id,
            name,
            note,
            flag,
            unflag,
            due,
            defer,
        } => {
            let input = TaskUpdateInput {
                name,
                note,
                flagged: flag_choice(flag, unflag),
                due,
                defer,
            };
            emit(
                &with_input(validate::task_changes(&input), |changes| {
                    bridge.update_task(&id, changes)
                }),
                format,
            )
        }
        TaskCommand::Complete { id } => emit(&bridge.complete_task(&id), format),
        TaskCommand::Defer { id, days } => emit(
            &with_input(validate::validate_days(days), |days| {
                bridge.defer_task(&id, days)
            }),
            format,
        ),
        TaskCommand::Delete { id } => emit(&bridge.delete_task(&id), format),
    }
}

fn projects(
    bridge: &Bridge<ProcessExecutor>,
    command: ProjectCommand,
    format: OutputFormat,
) -> Result<ExitCode> {
    match command {
        ProjectCommand::List {
            folder,
            status,
            page,
        } => {
            let query = ProjectQuery {
                folder_id: folder,
                status,
            };
            let input = validate::project_filter(&query)
                .and_then(|filter| Ok((filter, validate::validate_page(page.input())?)));
            emit(
                &with_input(input, |(filter, page)| bridge.list_projects(filter, page)),
                format,
            )
        }
        ProjectCommand::Show { id } => emit(&bridge.get_project(&id), format),
        ProjectCommand::Add {
            name,
            note,
            folder,
            sequential,
        } => {
            let input = NewProjectInput {
                name,
                note,
                folder_id: folder,
                sequential,
            };
            emit(
                &with_input(validate::new_project(&input), |project| {
                    bridge.create_project(project)
                }),
                format,
            )
        }
        ProjectCommand::Complete { id } => emit(&bridge.complete_project(&id), format),
    }
}
