//! Error types for dx

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dx operations
pub type Result<T> = std::result::Result<T, DxError>;

/// Exit code used when the dispatcher cannot find something to run
pub const EXIT_DISPATCH: i32 = 2;

/// Exit code for every other failure
pub const EXIT_FAILURE: i32 = 1;

/// Main error type for dx
#[derive(Error, Debug)]
pub enum DxError {
    /// A shell command exited with a non-zero status
    #[error(transparent)]
    Process(#[from] ProcessFailure),

    /// A script or Taskfile could not be loaded
    #[error("Failed to load module: {0}")]
    ModuleLoad(#[from] ModuleLoadError),

    /// Task selection errors
    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    /// Step execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DxError {
    /// Process exit code the CLI should terminate with
    pub fn exit_code(&self) -> i32 {
        match self {
            DxError::Dispatch(
                DispatchError::TaskfileNotFound(_)
                | DispatchError::NoDefaultTask(_)
                | DispatchError::NoMatchingTask { .. },
            ) => EXIT_DISPATCH,
            _ => EXIT_FAILURE,
        }
    }

    /// The underlying process failure, if this error is one
    pub fn as_process_failure(&self) -> Option<&ProcessFailure> {
        match self {
            DxError::Process(failure) => Some(failure),
            _ => None,
        }
    }
}

/// A child shell exited with a non-zero status.
///
/// `stdout` and `stderr` hold whatever was captured; both are empty when the
/// command ran with inherited streams.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Command failed with exit code {exit_code}")]
pub struct ProcessFailure {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Module resolution and loading errors
#[derive(Error, Debug)]
pub enum ModuleLoadError {
    #[error("'{0}' does not exist")]
    NotFound(PathBuf),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to fetch '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Fetching '{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to parse '{module}': {source}")]
    Parse {
        module: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid module '{module}': {reason}")]
    Invalid { module: String, reason: String },
}

/// Task discovery and selection errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Failed to find {0} file.")]
    TaskfileNotFound(String),

    #[error("No default task found in {0}, add a 'default' entry to define one.")]
    NoDefaultTask(String),

    #[error("No '{}' tasks found in {taskfile}.", requested.join(","))]
    NoMatchingTask {
        requested: Vec<String>,
        taskfile: String,
    },

    #[error("Task '{0}' is not defined")]
    TaskNotFound(String),

    #[error("Task '{0}' calls itself: {1}")]
    RecursiveTask(String, String),
}

/// Step execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Failed to start shell '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to change directory to '{}': {source}", path.display())]
    Cd {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid duration '{0}', expected a number with an optional s/m/h/d unit")]
    InvalidDuration(String),

    #[error("Invalid step: {0}")]
    InvalidStep(String),

    #[error("Failed to read from the terminal: {0}")]
    Prompt(#[source] io::Error),
}

/// Specialized result type for module loading
pub type LoadResult<T> = std::result::Result<T, ModuleLoadError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;
