//! Taskfile validation
//!
//! This module provides validation logic for loaded Taskfiles.

use crate::config::types::{DefaultTask, Step, StepMode, TaskDef, Taskfile, DEFAULT_TASK};
use std::collections::HashSet;

/// Validate a complete Taskfile, returning a human-readable reason on failure
pub fn validate_taskfile(taskfile: &Taskfile) -> Result<(), String> {
    if taskfile.tasks.contains_key(DEFAULT_TASK) {
        return Err(format!(
            "'{}' is reserved, use the top-level 'default' entry instead",
            DEFAULT_TASK
        ));
    }

    if let Some(DefaultTask::Name(name)) = &taskfile.default {
        if !taskfile.tasks.contains_key(name) {
            return Err(format!("default task '{}' is not defined", name));
        }
    }

    let known: HashSet<&str> = taskfile.task_defs().map(|(name, _)| name).collect();

    validate_steps("run", &taskfile.run, &known)?;
    for (name, task) in taskfile.task_defs() {
        validate_task(name, task, &known)?;
    }

    Ok(())
}

/// Validate a single task
pub fn validate_task(name: &str, task: &TaskDef, known: &HashSet<&str>) -> Result<(), String> {
    validate_steps(&format!("task '{}'", name), &task.run, known)
}

fn validate_steps(owner: &str, steps: &[Step], known: &HashSet<&str>) -> Result<(), String> {
    for (i, step) in steps.iter().enumerate() {
        let Step::Detailed(def) = step else {
            continue;
        };

        let actions = def.actions();
        match actions.as_slice() {
            [] => {
                return Err(format!("{}: step {} has no action", owner, i + 1));
            }
            [_] => {}
            several => {
                return Err(format!(
                    "{}: step {} has several actions ({})",
                    owner,
                    i + 1,
                    several.join(", ")
                ));
            }
        }

        if let Some(target) = &def.task {
            if !known.contains(target.as_str()) {
                return Err(format!(
                    "{}: step {} calls undefined task '{}'",
                    owner,
                    i + 1,
                    target
                ));
            }
        }

        if def.each.is_some() && def.mode != StepMode::Lines {
            return Err(format!(
                "{}: step {} uses 'each' outside of lines mode",
                owner,
                i + 1
            ));
        }
    }
    Ok(())
}
