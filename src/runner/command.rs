//! Command execution
//!
//! This module launches the configured shell, primes it over stdin with the
//! alias and environment declarations, feeds it the compiled command line and
//! collects the result.

use crate::error::{DxError, ExecutionError, ProcessFailure, Result};
use crate::runner::{CommandTemplate, ExecutionContext, ShellSnapshot};
use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command as TokioCommand};

/// How the output of a command is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Capture stdout and stderr, return stdout when done
    Buffered,
    /// Capture like `Buffered`, then hand the output out line by line
    Lines,
    /// Share the parent's stdout and stderr
    #[default]
    Inherit,
}

impl OutputMode {
    fn is_captured(self) -> bool {
        !matches!(self, OutputMode::Inherit)
    }
}

/// Outcome of a command, whether it succeeded or not
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl From<ProcessFailure> for ProcessResult {
    fn from(failure: ProcessFailure) -> Self {
        ProcessResult {
            exit_code: failure.exit_code,
            stdout: Some(failure.stdout),
            stderr: Some(failure.stderr),
        }
    }
}

impl From<String> for ProcessResult {
    fn from(stdout: String) -> Self {
        ProcessResult {
            exit_code: 0,
            stdout: Some(stdout),
            stderr: Some(String::new()),
        }
    }
}

/// Output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Captured { stdout: String, stderr: String },
    Inherited,
}

/// Directive that turns on alias expansion in a non-interactive shell
pub fn alias_directive(shell: &str) -> &'static str {
    if shell.ends_with("bash") {
        "shopt -s expand_aliases;"
    } else if shell.ends_with("zsh") {
        "setopt aliases;"
    } else {
        ""
    }
}

/// A command bound to the shell state it was launched with.
///
/// Creating an invocation copies the context, so aliases or exports added
/// afterwards do not reach a command that is already under way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    snapshot: ShellSnapshot,
    command_line: String,
}

impl Invocation {
    pub fn new(ctx: &ExecutionContext, command_line: impl Into<String>) -> Self {
        Invocation {
            snapshot: ctx.snapshot(),
            command_line: command_line.into(),
        }
    }

    pub fn snapshot(&self) -> &ShellSnapshot {
        &self.snapshot
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// The chunks written to the shell's stdin, in order
    pub fn stdin_chunks(&self) -> Vec<String> {
        let mut chunks = Vec::with_capacity(3);

        if !self.snapshot.aliases.is_empty() {
            let definitions: Vec<String> = self
                .snapshot
                .aliases
                .iter()
                .map(|alias| alias.definition())
                .collect();
            chunks.push(format!(
                "{}{}\n",
                alias_directive(&self.snapshot.shell),
                definitions.join(" ")
            ));
        }

        let declarations: Vec<String> = self
            .snapshot
            .env
            .iter()
            .map(|(name, value)| format!("{}=\"{}\";", name, value))
            .collect();
        chunks.push(format!("{}\n", declarations.join(" ")));

        chunks.push(format!("{}{}", self.snapshot.prefix, self.command_line));
        chunks
    }

    /// Launch the shell and wait for it to finish
    pub async fn run(self, mode: OutputMode) -> Result<Output> {
        let shell = self.snapshot.shell.clone();
        tracing::debug!(
            shell = %shell,
            mode = ?mode,
            dir = %self.snapshot.working_dir.display(),
            command = %self.command_line,
            "spawning shell"
        );

        let mut command = TokioCommand::new(&shell);
        command
            .current_dir(&self.snapshot.working_dir)
            .envs(self.snapshot.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped());
        if mode.is_captured() {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let mut child = command.spawn().map_err(|source| ExecutionError::Spawn {
            shell: shell.clone(),
            source,
        })?;

        if let Some(stdin) = child.stdin.take() {
            feed_stdin(stdin, &self.stdin_chunks()).await?;
        }

        let output = if mode.is_captured() {
            let output = child.wait_with_output().await?;
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            check_status(output.status, stdout, stderr)?
        } else {
            let status = child.wait().await?;
            check_status(status, String::new(), String::new())?;
            Output::Inherited
        };

        Ok(output)
    }
}

/// Write the chunks in order, then close stdin so the shell sees EOF
async fn feed_stdin(mut stdin: ChildStdin, chunks: &[String]) -> Result<()> {
    for chunk in chunks {
        match stdin.write_all(chunk.as_bytes()).await {
            Ok(()) => {}
            // The shell already exited; its status tells what happened
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
    match stdin.shutdown().await {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e.into()),
        _ => Ok(()),
    }
}

fn check_status(status: ExitStatus, stdout: String, stderr: String) -> Result<Output> {
    let exit_code = exit_code(status);
    if exit_code == 0 {
        Ok(Output::Captured { stdout, stderr })
    } else {
        tracing::debug!(exit_code, "command failed");
        Err(ProcessFailure {
            exit_code,
            stdout,
            stderr,
        }
        .into())
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// Run a command and return its stdout
pub async fn run(ctx: &ExecutionContext, template: &CommandTemplate) -> Result<String> {
    match Invocation::new(ctx, template.compile())
        .run(OutputMode::Buffered)
        .await?
    {
        Output::Captured { stdout, .. } => Ok(stdout),
        Output::Inherited => Ok(String::new()),
    }
}

/// Run a command attached to the parent's stdout and stderr
pub async fn run_inherit(ctx: &ExecutionContext, template: &CommandTemplate) -> Result<()> {
    Invocation::new(ctx, template.compile())
        .run(OutputMode::Inherit)
        .await?;
    Ok(())
}

/// Turn a failed command into a plain [`ProcessResult`] instead of an error.
///
/// Errors other than a non-zero exit, such as a shell that cannot be
/// started, are still returned as errors.
pub async fn nothrow<F>(command: F) -> Result<ProcessResult>
where
    F: Future<Output = Result<String>>,
{
    match command.await {
        Ok(stdout) => Ok(ProcessResult::from(stdout)),
        Err(DxError::Process(failure)) => Ok(ProcessResult::from(failure)),
        Err(e) => Err(e),
    }
}

/// [`run`] without failing on a non-zero exit
pub async fn run_nothrow(
    ctx: &ExecutionContext,
    template: &CommandTemplate,
) -> Result<ProcessResult> {
    nothrow(run(ctx, template)).await
}
