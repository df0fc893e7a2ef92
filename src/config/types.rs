//! Core Taskfile types
//!
//! This module defines the data structures that represent a Taskfile or
//! script file on disk.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name reserved for the task that runs when none is requested
pub const DEFAULT_TASK: &str = "default";

/// Top-level Taskfile structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Taskfile {
    /// Shell program used for every command (e.g., "bash")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    /// Prefix placed in front of every command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Shell aliases registered when the file is loaded
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,

    /// Environment overlay entries exported when the file is loaded
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Steps evaluated when the file is loaded
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_steps"
    )]
    pub run: Vec<Step>,

    /// Task to run when no task name is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultTask>,

    /// Tasks defined in the file
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskDef>,
}

/// The `default` entry: either the name of a task or a task of its own
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DefaultTask {
    Name(String),
    Inline(TaskDef),
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDef {
    /// Description shown when listing tasks
    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    /// Steps to execute
    #[serde(default, deserialize_with = "deserialize_steps")]
    pub run: Vec<Step>,
}

/// A step - either a bare command or a detailed action
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Step {
    /// Command run with inherited output
    Command(String),

    /// One action plus its modifiers
    Detailed(StepDef),
}

/// A detailed step. Exactly one action key must be set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StepDef {
    /// Command to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sh: Option<String>,

    /// Output handling for `sh`
    #[serde(default)]
    pub mode: StepMode,

    /// Record a failing `sh` instead of aborting the task
    #[serde(default)]
    pub nothrow: bool,

    /// Variable receiving the trimmed stdout of `sh` or the `prompt` answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<String>,

    /// Text echoed per output line in `lines` mode, `${line}` is the line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub each: Option<String>,

    /// Aliases to register
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alias: BTreeMap<String, String>,

    /// Environment overlay entries to export
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub export: BTreeMap<String, String>,

    /// Directory to change to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cd: Option<String>,

    /// Text to print
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_scalar"
    )]
    pub echo: Option<String>,

    /// Duration to pause, e.g. 10, "1.5s", "2m"
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_scalar"
    )]
    pub sleep: Option<String>,

    /// Question to ask on the terminal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Another task to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

impl StepDef {
    /// Names of the action keys that are set
    pub fn actions(&self) -> Vec<&'static str> {
        let mut actions = Vec::new();
        if self.sh.is_some() {
            actions.push("sh");
        }
        if !self.alias.is_empty() {
            actions.push("alias");
        }
        if !self.export.is_empty() {
            actions.push("export");
        }
        if self.cd.is_some() {
            actions.push("cd");
        }
        if self.echo.is_some() {
            actions.push("echo");
        }
        if self.sleep.is_some() {
            actions.push("sleep");
        }
        if self.prompt.is_some() {
            actions.push("prompt");
        }
        if self.task.is_some() {
            actions.push("task");
        }
        actions
    }
}

/// Output mode of an `sh` step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMode {
    #[default]
    Inherit,
    Buffered,
    Lines,
}

impl Taskfile {
    /// Every task definition reachable by name, including an inline default
    pub fn task_defs(&self) -> impl Iterator<Item = (&str, &TaskDef)> {
        let inline_default = match &self.default {
            Some(DefaultTask::Inline(def)) => Some((DEFAULT_TASK, def)),
            _ => None,
        };
        self.tasks
            .iter()
            .map(|(name, def)| (name.as_str(), def))
            .chain(inline_default)
    }
}

/// Custom deserializer for steps that handles both single values and arrays
fn deserialize_steps<'de, D>(deserializer: D) -> Result<Vec<Step>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single string command
        Value::String(s) => Ok(vec![Step::Command(s)]),
        // Single detailed step
        Value::Mapping(_) => Ok(vec![Step::deserialize(value).map_err(D::Error::custom)?]),
        // Array of steps
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| Step::deserialize(item).map_err(D::Error::custom))
            .collect(),
        // Null or not present
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("run must be a string, a step, or an array of steps")),
    }
}

/// Accept a string or a bare number where text is expected
fn deserialize_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(s) => s,
        Scalar::Integer(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
    }))
}
