//! Execution context for running commands and tasks
//!
//! The context holds the shell configuration every command is launched with:
//! the shell program, the strict-mode prefix, registered aliases, the
//! environment overlay and the working directory. It is shared by reference
//! between concurrently running tasks, so the mutable part lives behind a lock
//! that is only ever held for the duration of a read or a single update.

use crate::error::{ExecutionError, ExecutionResult};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shell used when nothing else is configured
pub const DEFAULT_SHELL: &str = "bash";

/// Makes the shell fail fast on errors, unset variables and broken pipelines
pub const STRICT_MODE_PREFIX: &str = "set -euo pipefail;";

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Normal = 1,
    Verbose = 2,
}

/// A shell alias registered with [`ExecutionContext::alias`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub command: String,
}

impl Alias {
    /// The shell statement that defines this alias, e.g. `alias ll='ls -al';`
    pub fn definition(&self) -> String {
        format!("alias {}='{}';", self.name, self.command)
    }
}

/// Shell state copied out of the context when a command is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSnapshot {
    pub shell: String,
    pub prefix: String,
    pub aliases: Vec<Alias>,
    pub env: Vec<(String, String)>,
    pub working_dir: PathBuf,
}

/// Positional arguments of the running script (`$0`, `$1`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptArgs {
    program: String,
    args: Vec<String>,
}

impl ScriptArgs {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        ScriptArgs {
            program: program.into(),
            args,
        }
    }

    /// `$0` for index 0, then the arguments from `$1` on
    pub fn get(&self, index: usize) -> Option<&str> {
        match index {
            0 => Some(self.program.as_str()),
            n => self.args.get(n - 1).map(String::as_str),
        }
    }

    /// Everything after `$0`
    pub fn all(&self) -> &[String] {
        &self.args
    }

    /// `$#`
    pub fn count(&self) -> usize {
        self.args.len()
    }

    /// `$*`
    pub fn joined(&self) -> String {
        self.args.join(" ")
    }

    /// Interpolation variables: `0`..`n`, `@`, `*` and `#`
    pub fn as_vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("0".to_string(), self.program.clone());
        for (i, arg) in self.args.iter().enumerate() {
            vars.insert((i + 1).to_string(), arg.clone());
        }
        vars.insert("@".to_string(), self.joined());
        vars.insert("*".to_string(), self.joined());
        vars.insert("#".to_string(), self.count().to_string());
        vars
    }
}

#[derive(Debug, Clone)]
struct ShellState {
    shell: String,
    prefix: String,
    aliases: Vec<Alias>,
    env: Vec<(String, String)>,
    working_dir: PathBuf,
}

/// Execution context shared by every command a script or task runs
#[derive(Debug)]
pub struct ExecutionContext {
    state: RwLock<ShellState>,

    /// Positional arguments of the script being run
    pub args: ScriptArgs,

    /// Process environment as it was when the context was created
    pub process_env: HashMap<String, String>,

    /// Verbosity level
    pub verbosity: Verbosity,
}

impl ExecutionContext {
    /// Create a new context with default settings
    pub fn new() -> Self {
        ExecutionContext {
            state: RwLock::new(ShellState {
                shell: DEFAULT_SHELL.to_string(),
                prefix: STRICT_MODE_PREFIX.to_string(),
                aliases: Vec::new(),
                env: Vec::new(),
                working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            }),
            args: ScriptArgs::default(),
            process_env: env::vars().collect(),
            verbosity: Verbosity::Normal,
        }
    }

    /// Use a different shell program
    pub fn with_shell(self, shell: impl Into<String>) -> Self {
        self.set_shell(shell);
        self
    }

    /// Use a different command prefix
    pub fn with_prefix(self, prefix: impl Into<String>) -> Self {
        self.set_prefix(prefix);
        self
    }

    /// Create a context with a specific working directory
    pub fn with_working_dir(self, dir: PathBuf) -> Self {
        self.write().working_dir = dir;
        self
    }

    /// Set positional script arguments
    pub fn with_args(mut self, args: ScriptArgs) -> Self {
        self.args = args;
        self
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, ShellState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ShellState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn shell(&self) -> String {
        self.read().shell.clone()
    }

    pub fn set_shell(&self, shell: impl Into<String>) {
        self.write().shell = shell.into();
    }

    pub fn prefix(&self) -> String {
        self.read().prefix.clone()
    }

    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.write().prefix = prefix.into();
    }

    /// Register an alias for every command launched from now on
    pub fn alias(&self, name: impl Into<String>, command: impl Into<String>) {
        let alias = Alias {
            name: name.into(),
            command: command.into(),
        };
        tracing::debug!(name = %alias.name, command = %alias.command, "registering alias");
        self.write().aliases.push(alias);
    }

    pub fn aliases(&self) -> Vec<Alias> {
        self.read().aliases.clone()
    }

    /// Add or replace an environment overlay entry
    pub fn export(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let mut state = self.write();
        match state.env.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => state.env.push((name, value)),
        }
    }

    /// Look up an overlay entry
    pub fn env_var(&self, name: &str) -> Option<String> {
        self.read()
            .env
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    pub fn env_overlay(&self) -> Vec<(String, String)> {
        self.read().env.clone()
    }

    /// Change the working directory of subsequent commands.
    ///
    /// A leading `~` expands to `HOME`; relative paths resolve against the
    /// current working directory. The target must be an existing directory.
    pub fn cd(&self, path: &str) -> ExecutionResult<()> {
        let expanded = match (path.strip_prefix('~'), self.process_env.get("HOME")) {
            (Some(rest), Some(home)) => format!("{}{}", home, rest),
            _ => path.to_string(),
        };
        let target = self.pwd().join(Path::new(&expanded));

        let metadata = fs::metadata(&target).map_err(|source| ExecutionError::Cd {
            path: target.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ExecutionError::Cd {
                path: target,
                source: io::Error::other("not a directory"),
            });
        }

        self.write().working_dir = target;
        Ok(())
    }

    pub fn pwd(&self) -> PathBuf {
        self.read().working_dir.clone()
    }

    /// Copy the shell state a command should be launched with
    pub fn snapshot(&self) -> ShellSnapshot {
        let state = self.read();
        ShellSnapshot {
            shell: state.shell.clone(),
            prefix: state.prefix.clone(),
            aliases: state.aliases.clone(),
            env: state.env.clone(),
            working_dir: state.working_dir.clone(),
        }
    }

    /// Variables visible to `${name}` interpolation.
    ///
    /// Later sources win: process environment, then the overlay, then the
    /// positional arguments.
    pub fn vars(&self) -> HashMap<String, String> {
        let mut vars = self.process_env.clone();
        vars.extend(self.env_overlay());
        vars.extend(self.args.as_vars());
        vars
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
