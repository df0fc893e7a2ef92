//! Step execution
//!
//! Taskfile steps are converted into [`Action`]s once, when the file is
//! loaded, and interpreted against the execution context every time the
//! owning task runs.

use crate::config::{Step, StepMode, Taskfile};
use crate::error::{DispatchError, DxError, ExecutionError, ExecutionResult, Result};
use crate::runner::{
    interpolate, interpolate_map, run, run_inherit, stream_lines, template_from,
    ExecutionContext, ProcessResult,
};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use tokio::io::AsyncReadExt;

/// Variable holding the exit code of the last `sh` step
pub const STATUS_VAR: &str = "status";

/// Variable holding the current line in `each`
pub const LINE_VAR: &str = "line";

/// Runtime representation of a step
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Sh {
        command: String,
        mode: StepMode,
        nothrow: bool,
        capture: Option<String>,
        each: Option<String>,
    },
    Alias(Vec<(String, String)>),
    Export(Vec<(String, String)>),
    Cd(String),
    Echo(String),
    Sleep(String),
    Prompt {
        message: String,
        capture: Option<String>,
    },
    Task(String),
}

impl Action {
    /// Create from config
    pub fn from_config(step: &Step) -> ExecutionResult<Self> {
        let def = match step {
            Step::Command(command) => {
                return Ok(Action::Sh {
                    command: command.clone(),
                    mode: StepMode::Inherit,
                    nothrow: false,
                    capture: None,
                    each: None,
                })
            }
            Step::Detailed(def) => def,
        };

        let pairs = |map: &std::collections::BTreeMap<String, String>| {
            map.iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Vec<_>>()
        };

        let action = if let Some(command) = &def.sh {
            Action::Sh {
                command: command.clone(),
                mode: def.mode,
                nothrow: def.nothrow,
                capture: def.capture.clone(),
                each: def.each.clone(),
            }
        } else if !def.alias.is_empty() {
            Action::Alias(pairs(&def.alias))
        } else if !def.export.is_empty() {
            Action::Export(pairs(&def.export))
        } else if let Some(dir) = &def.cd {
            Action::Cd(dir.clone())
        } else if let Some(text) = &def.echo {
            Action::Echo(text.clone())
        } else if let Some(duration) = &def.sleep {
            Action::Sleep(duration.clone())
        } else if let Some(message) = &def.prompt {
            Action::Prompt {
                message: message.clone(),
                capture: def.capture.clone(),
            }
        } else if let Some(task) = &def.task {
            Action::Task(task.clone())
        } else {
            return Err(ExecutionError::InvalidStep("step has no action".to_string()));
        };

        Ok(action)
    }
}

/// Converted steps of one task
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub description: Option<String>,
    pub actions: Vec<Action>,
}

impl Script {
    pub fn from_steps(description: Option<String>, steps: &[Step]) -> ExecutionResult<Self> {
        Ok(Script {
            description,
            actions: steps
                .iter()
                .map(Action::from_config)
                .collect::<ExecutionResult<Vec<_>>>()?,
        })
    }
}

/// Every script of a Taskfile, addressable by task name
#[derive(Debug, Clone, Default)]
pub struct ScriptLibrary {
    /// Top-level steps, evaluated when the file is loaded
    pub main: Script,
    scripts: HashMap<String, Script>,
}

impl ScriptLibrary {
    pub fn from_taskfile(taskfile: &Taskfile) -> ExecutionResult<Self> {
        let main = Script::from_steps(None, &taskfile.run)?;
        let scripts = taskfile
            .task_defs()
            .map(|(name, def)| {
                Script::from_steps(def.desc.clone(), &def.run).map(|s| (name.to_string(), s))
            })
            .collect::<ExecutionResult<HashMap<_, _>>>()?;
        Ok(ScriptLibrary { main, scripts })
    }

    pub fn get(&self, name: &str) -> Option<&Script> {
        self.scripts.get(name)
    }

    /// Run the top-level steps
    pub async fn run_main(&self, ctx: &ExecutionContext) -> Result<()> {
        StepRunner::new(ctx, self, Vec::new())
            .run_actions(&self.main.actions)
            .await
    }

    /// Run a task by name. `stack` holds the tasks already being run by the
    /// caller and is used to reject recursion.
    pub fn run_task<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        name: &'a str,
        mut stack: Vec<String>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if stack.iter().any(|t| t == name) {
                stack.push(name.to_string());
                let chain = stack.join(" -> ");
                return Err(DispatchError::RecursiveTask(name.to_string(), chain).into());
            }
            let script = self
                .get(name)
                .ok_or_else(|| DispatchError::TaskNotFound(name.to_string()))?;

            stack.push(name.to_string());
            tracing::debug!(task = %name, "running task");
            StepRunner::new(ctx, self, stack)
                .run_actions(&script.actions)
                .await
        }
        .boxed()
    }
}

/// Interprets actions for one task invocation
struct StepRunner<'a> {
    ctx: &'a ExecutionContext,
    library: &'a ScriptLibrary,
    stack: Vec<String>,
    /// Variables captured by earlier steps of this invocation
    locals: HashMap<String, String>,
}

impl<'a> StepRunner<'a> {
    fn new(ctx: &'a ExecutionContext, library: &'a ScriptLibrary, stack: Vec<String>) -> Self {
        StepRunner {
            ctx,
            library,
            stack,
            locals: HashMap::new(),
        }
    }

    fn vars(&self) -> HashMap<String, String> {
        let mut vars = self.ctx.vars();
        vars.extend(self.locals.clone());
        vars
    }

    async fn run_actions(&mut self, actions: &[Action]) -> Result<()> {
        for action in actions {
            self.run_action(action).await?;
        }
        Ok(())
    }

    async fn run_action(&mut self, action: &Action) -> Result<()> {
        let vars = self.vars();
        match action {
            Action::Sh {
                command,
                mode,
                nothrow,
                capture,
                each,
            } => {
                let template = template_from(command, &vars);
                let result = match mode {
                    StepMode::Inherit => {
                        let outcome = run_inherit(self.ctx, &template)
                            .await
                            .map(|()| String::new());
                        settle(outcome, *nothrow)?
                    }
                    StepMode::Buffered => {
                        let result = settle(run(self.ctx, &template).await, *nothrow)?;
                        if capture.is_none() {
                            print!("{}", result.stdout.as_deref().unwrap_or_default());
                        }
                        result
                    }
                    StepMode::Lines => {
                        let outcome = match stream_lines(self.ctx, &template).await {
                            Ok(lines) => {
                                let lines: Vec<String> = lines.collect();
                                for line in &lines {
                                    match each {
                                        Some(format) => {
                                            let mut line_vars = vars.clone();
                                            line_vars.insert(LINE_VAR.to_string(), line.clone());
                                            println!("{}", interpolate(format, &line_vars));
                                        }
                                        None => println!("{}", line),
                                    }
                                }
                                Ok(lines.join("\n"))
                            }
                            Err(e) => Err(e),
                        };
                        settle(outcome, *nothrow)?
                    }
                };

                self.locals
                    .insert(STATUS_VAR.to_string(), result.exit_code.to_string());
                if let Some(name) = capture {
                    let stdout = result.stdout.unwrap_or_default();
                    self.locals.insert(name.clone(), stdout.trim().to_string());
                }
            }
            Action::Alias(aliases) => {
                let aliases = interpolate_map(aliases.iter().map(|(k, v)| (k, v)), &vars);
                for (name, command) in aliases {
                    self.ctx.alias(name, command);
                }
            }
            Action::Export(entries) => {
                let entries = interpolate_map(entries.iter().map(|(k, v)| (k, v)), &vars);
                for (name, value) in entries {
                    self.ctx.export(name, value);
                }
            }
            Action::Cd(dir) => {
                self.ctx.cd(&interpolate(dir, &vars))?;
            }
            Action::Echo(text) => {
                println!("{}", interpolate(text, &vars));
            }
            Action::Sleep(duration) => {
                let duration = parse_duration(&interpolate(duration, &vars))?;
                tokio::time::sleep(duration).await;
            }
            Action::Prompt { message, capture } => {
                let answer = prompt(&interpolate(message, &vars)).await?;
                if let Some(name) = capture {
                    self.locals.insert(name.clone(), answer);
                }
            }
            Action::Task(name) => {
                self.library
                    .run_task(self.ctx, name, self.stack.clone())
                    .await?;
            }
        }
        Ok(())
    }
}

/// Apply a step's `nothrow` setting to a command outcome
fn settle(outcome: Result<String>, nothrow: bool) -> Result<ProcessResult> {
    match outcome {
        Ok(stdout) => Ok(ProcessResult::from(stdout)),
        Err(DxError::Process(failure)) if nothrow => {
            tracing::warn!(exit_code = failure.exit_code, "command failed, continuing");
            Ok(ProcessResult::from(failure))
        }
        Err(e) => Err(e),
    }
}

/// Parse `10`, `1.5s`, `2m`, `1h` or `1d`. Bare numbers are seconds.
pub fn parse_duration(text: &str) -> ExecutionResult<Duration> {
    let text = text.trim();
    let invalid = || ExecutionError::InvalidDuration(text.to_string());

    let (number, unit_secs) = match text.char_indices().last() {
        Some((i, 's')) => (&text[..i], 1.0),
        Some((i, 'm')) => (&text[..i], 60.0),
        Some((i, 'h')) => (&text[..i], 3600.0),
        Some((i, 'd')) => (&text[..i], 86400.0),
        Some(_) => (text, 1.0),
        None => return Err(invalid()),
    };

    let count: f64 = number.trim().parse().map_err(|_| invalid())?;
    let secs = count * unit_secs;
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}

/// Print `message` and read one line from stdin, without the line break
pub async fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;

    // byte by byte, so nothing after the line is consumed
    let mut stdin = tokio::io::stdin();
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let read = stdin.read(&mut byte).await.map_err(ExecutionError::Prompt)?;
        if read == 0 || byte[0] == b'\n' {
            break;
        }
        bytes.push(byte[0]);
    }

    let line = String::from_utf8_lossy(&bytes);
    Ok(line.trim_end_matches('\r').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_taskfile;
    use tempfile::TempDir;

    fn library(yaml: &str) -> ScriptLibrary {
        let taskfile = parse_taskfile(yaml, "test").unwrap();
        ScriptLibrary::from_taskfile(&taskfile).unwrap()
    }

    fn ctx_in(dir: &TempDir) -> ExecutionContext {
        ExecutionContext::new().with_working_dir(dir.path().to_path_buf())
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("1e300").is_err());
        assert!(parse_duration("1e20d").is_err());
        assert!(parse_duration("NaN").is_err());
    }

    #[test]
    fn test_action_from_bare_command() {
        let action = Action::from_config(&Step::Command("make".into())).unwrap();
        assert!(matches!(action, Action::Sh { mode: StepMode::Inherit, nothrow: false, .. }));
    }

    #[tokio::test]
    async fn test_capture_and_reuse() {
        let temp_dir = TempDir::new().unwrap();
        let lib = library(
            r#"
tasks:
  write:
    run:
      - sh: printf dx
        mode: buffered
        capture: name
      - sh: echo "${name}-${status}" > out.txt
"#,
        );
        let ctx = ctx_in(&temp_dir);
        lib.run_task(&ctx, "write", Vec::new()).await.unwrap();
        let written = std::fs::read_to_string(temp_dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "dx-0\n");
    }

    #[tokio::test]
    async fn test_nothrow_records_status() {
        let temp_dir = TempDir::new().unwrap();
        let lib = library(
            r#"
tasks:
  tolerant:
    run:
      - sh: exit 3
        nothrow: true
      - sh: echo ${status} > status.txt
"#,
        );
        let ctx = ctx_in(&temp_dir);
        lib.run_task(&ctx, "tolerant", Vec::new()).await.unwrap();
        let written = std::fs::read_to_string(temp_dir.path().join("status.txt")).unwrap();
        assert_eq!(written.trim(), "3");
    }

    #[tokio::test]
    async fn test_failure_stops_task() {
        let temp_dir = TempDir::new().unwrap();
        let lib = library(
            r#"
tasks:
  strict:
    run:
      - exit 3
      - touch never.txt
"#,
        );
        let ctx = ctx_in(&temp_dir);
        let err = lib.run_task(&ctx, "strict", Vec::new()).await.unwrap_err();
        assert_eq!(err.as_process_failure().map(|f| f.exit_code), Some(3));
        assert!(!temp_dir.path().join("never.txt").exists());
    }

    #[tokio::test]
    async fn test_alias_export_and_cd_update_context() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        let lib = library(
            r#"
tasks:
  setup:
    run:
      - alias:
          ll: ls -al
      - export:
          TARGET: "${HOME}/out"
      - cd: sub
      - touch here.txt
"#,
        );
        let mut ctx = ctx_in(&temp_dir);
        ctx.process_env.insert("HOME".into(), "/home/dx".into());
        lib.run_task(&ctx, "setup", Vec::new()).await.unwrap();

        assert_eq!(ctx.aliases().len(), 1);
        assert_eq!(ctx.env_var("TARGET"), Some("/home/dx/out".to_string()));
        assert!(temp_dir.path().join("sub/here.txt").exists());
    }

    #[tokio::test]
    async fn test_cd_to_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let lib = library(
            r#"
tasks:
  lost:
    run:
      - cd: no/such/dir
      - touch never.txt
"#,
        );
        let ctx = ctx_in(&temp_dir);
        let err = lib.run_task(&ctx, "lost", Vec::new()).await.unwrap_err();
        assert!(matches!(err, DxError::Execution(ExecutionError::Cd { .. })));
        assert!(err.to_string().contains("no/such/dir"));
        assert_eq!(ctx.pwd(), temp_dir.path());
        assert!(!temp_dir.path().join("never.txt").exists());
    }

    #[tokio::test]
    async fn test_nested_task_call() {
        let temp_dir = TempDir::new().unwrap();
        let lib = library(
            r#"
tasks:
  outer:
    run:
      - task: inner
      - touch outer.txt
  inner:
    run: touch inner.txt
"#,
        );
        let ctx = ctx_in(&temp_dir);
        lib.run_task(&ctx, "outer", Vec::new()).await.unwrap();
        assert!(temp_dir.path().join("inner.txt").exists());
        assert!(temp_dir.path().join("outer.txt").exists());
    }

    #[tokio::test]
    async fn test_recursive_task_call_is_rejected() {
        let lib = library(
            r#"
tasks:
  ping:
    run:
      - task: pong
  pong:
    run:
      - task: ping
"#,
        );
        let ctx = ExecutionContext::new();
        let err = lib.run_task(&ctx, "ping", Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("ping -> pong -> ping"));
    }

    #[tokio::test]
    async fn test_main_steps() {
        let temp_dir = TempDir::new().unwrap();
        let lib = library("run:\n  - echo: hello\n  - touch main.txt\n");
        let ctx = ctx_in(&temp_dir);
        lib.run_main(&ctx).await.unwrap();
        assert!(temp_dir.path().join("main.txt").exists());
    }
}
