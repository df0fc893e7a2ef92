//! Main CLI application

use crate::cli::completion::completion_script;
use crate::cli::logging::init_logging;
use crate::config::{find_taskfile, is_script_reference, is_taskfile_name, ModuleId};
use crate::error::{DispatchError, DxError};
use crate::runner::{
    load_dotenv, load_module, run_inherit, ExecutionContext, ScriptArgs, Verbosity,
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::env;
use std::path::PathBuf;

/// Reinstalls dx from its own repository
const UPGRADE_COMMAND: &str = concat!(
    "cargo install --force --git ",
    env!("CARGO_PKG_REPOSITORY"),
    " ",
    env!("CARGO_PKG_NAME")
);

/// What the command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `-t, --tasks`
    ListTasks,
    /// `-u, --upgrade`
    Upgrade,
    /// `-c, --completion <shell>`
    Completion(String),
    /// Tasks of the discovered Taskfile; empty means the default task
    Tasks(Vec<String>),
    /// A Taskfile given by path or URL, plus the tasks to run from it
    Taskfile { reference: String, tasks: Vec<String> },
    /// A plain script given by path or URL, plus its arguments
    Script { reference: String, args: Vec<String> },
}

/// CLI application
pub struct App {
    /// The clap command
    command: Command,
    /// Directory Taskfiles and relative scripts are resolved against
    cwd: PathBuf,
}

impl App {
    /// Create a new app rooted at the current directory
    pub fn new() -> Result<Self, DxError> {
        Ok(App {
            command: build_command(),
            cwd: env::current_dir()?,
        })
    }

    /// Create an app rooted at a specific directory
    pub fn with_cwd(cwd: PathBuf) -> Self {
        App {
            command: build_command(),
            cwd,
        }
    }

    /// Run the application with command line arguments
    pub fn run(self) -> Result<(), DxError> {
        let matches = self.command.clone().get_matches();
        let verbosity = get_verbosity(&matches);
        init_logging(verbosity);

        let request = parse_request(&matches);
        tracing::debug!(?request, "parsed command line");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.execute(request, verbosity))
    }

    /// Carry out a parsed request
    pub async fn execute(mut self, request: Request, verbosity: Verbosity) -> Result<(), DxError> {
        let ctx = ExecutionContext::new()
            .with_working_dir(self.cwd.clone())
            .with_verbosity(verbosity);

        match request {
            Request::Completion(shell) => {
                println!("{}", completion_script(&shell));
                Ok(())
            }
            Request::Upgrade => {
                println!("Begin to upgrade dx to last version.");
                run_inherit(&ctx, &UPGRADE_COMMAND.into()).await
            }
            Request::ListTasks => {
                let taskfile = find_taskfile(&self.cwd)?;
                let program = taskfile.display().to_string();
                let ctx = ctx.with_args(ScriptArgs::new(program, Vec::new()));
                load_dotenv(&ctx, &self.cwd)?;
                let registry = load_module(&ctx, &ModuleId::File(taskfile)).await?;
                for line in registry.listing() {
                    println!("{}", line);
                }
                Ok(())
            }
            Request::Tasks(tasks) => {
                let taskfile = match find_taskfile(&self.cwd) {
                    Ok(path) => path,
                    Err(DispatchError::TaskfileNotFound(_)) if tasks.is_empty() => {
                        self.command.print_help()?;
                        println!();
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };
                let reference = taskfile.display().to_string();
                self.run_taskfile(ctx, reference, tasks).await
            }
            Request::Taskfile { reference, tasks } => {
                self.run_taskfile(ctx, reference, tasks).await
            }
            Request::Script { reference, args } => {
                let ctx = ctx.with_args(ScriptArgs::new(reference.clone(), args));
                load_dotenv(&ctx, &self.cwd)?;
                load_module(&ctx, &ModuleId::resolve(&reference, &self.cwd)).await?;
                Ok(())
            }
        }
    }

    async fn run_taskfile(
        &self,
        ctx: ExecutionContext,
        reference: String,
        tasks: Vec<String>,
    ) -> Result<(), DxError> {
        let ctx = ctx.with_args(ScriptArgs::new(reference.clone(), tasks.clone()));
        load_dotenv(&ctx, &self.cwd)?;
        let registry = load_module(&ctx, &ModuleId::resolve(&reference, &self.cwd)).await?;
        registry.dispatch(&ctx, &tasks).await
    }
}

/// Build the clap command
pub fn build_command() -> Command {
    Command::new("dx")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A tool for writing better scripts and Taskfiles")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .help("Print version")
                .action(ArgAction::Version),
        )
        .arg(
            Arg::new("tasks")
                .short('t')
                .long("tasks")
                .help("List tasks in Taskfile")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("upgrade")
                .short('u')
                .long("upgrade")
                .help("Upgrade dx to last version")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("completion")
                .short('c')
                .long("completion")
                .value_name("SHELL")
                .help("Generate shell completion for zsh"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .help("Print debug logs")
                .action(ArgAction::SetTrue)
                .conflicts_with("quiet"),
        )
        .arg(
            Arg::new("script")
                .value_name("SCRIPT|TASK")
                .help("Script file, Taskfile or task name"),
        )
        .arg(
            Arg::new("args")
                .value_name("ARGS")
                .help("Script arguments or more task names")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Work out what to do from parsed arguments
pub fn parse_request(matches: &ArgMatches) -> Request {
    if matches.get_flag("tasks") {
        return Request::ListTasks;
    }
    if matches.get_flag("upgrade") {
        return Request::Upgrade;
    }
    if let Some(shell) = matches.get_one::<String>("completion") {
        return Request::Completion(shell.clone());
    }

    let rest: Vec<String> = matches
        .get_many::<String>("args")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    match matches.get_one::<String>("script") {
        None => Request::Tasks(Vec::new()),
        Some(script) if is_script_reference(script) && is_taskfile_name(script) => {
            Request::Taskfile {
                reference: script.clone(),
                tasks: rest,
            }
        }
        Some(script) if is_script_reference(script) => Request::Script {
            reference: script.clone(),
            args: rest,
        },
        Some(task) => {
            let mut tasks = vec![task.clone()];
            tasks.extend(rest);
            Request::Tasks(tasks)
        }
    }
}

/// Run the CLI application
pub fn run() -> Result<(), DxError> {
    App::new()?.run()
}
