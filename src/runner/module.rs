//! Loading and evaluating Taskfile modules
//!
//! Evaluating a module applies its shell settings, aliases and environment
//! to the execution context, runs its top-level steps, and registers its
//! tasks. Everything happens once, when the module is loaded.

use crate::config::{load_taskfile, DefaultTask, ModuleId, Taskfile};
use crate::error::{ModuleLoadError, Result};
use crate::runner::{interpolate_map, ExecutionContext, ScriptLibrary, Task, TaskRegistry};
use futures::FutureExt;
use std::path::Path;
use std::sync::Arc;

/// Load `.env` from `dir` into the environment overlay, if present
pub fn load_dotenv(ctx: &ExecutionContext, dir: &Path) -> Result<usize> {
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(0);
    }

    let mut count = 0;
    let entries = dotenvy::from_path_iter(&path).map_err(|e| invalid_dotenv(&path, e))?;
    for entry in entries {
        let (key, value) = entry.map_err(|e| invalid_dotenv(&path, e))?;
        ctx.export(key, value);
        count += 1;
    }
    tracing::debug!(path = %path.display(), count, "loaded .env");
    Ok(count)
}

fn invalid_dotenv(path: &Path, error: dotenvy::Error) -> ModuleLoadError {
    ModuleLoadError::Invalid {
        module: path.display().to_string(),
        reason: error.to_string(),
    }
}

/// Load a module and evaluate it against `ctx`
pub async fn load_module(ctx: &ExecutionContext, id: &ModuleId) -> Result<TaskRegistry> {
    let taskfile = load_taskfile(id).await?;
    evaluate(ctx, &taskfile, &module_name(id)).await
}

/// Short name of a module used in messages (the file name for local files)
pub fn module_name(id: &ModuleId) -> String {
    match id {
        ModuleId::File(path) => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.to_string()),
        ModuleId::Url(url) => url.clone(),
    }
}

/// Apply a parsed Taskfile to `ctx` and build its task registry
pub async fn evaluate(
    ctx: &ExecutionContext,
    taskfile: &Taskfile,
    source: &str,
) -> Result<TaskRegistry> {
    if let Some(shell) = &taskfile.shell {
        ctx.set_shell(shell.clone());
    }
    if let Some(prefix) = &taskfile.prefix {
        ctx.set_prefix(prefix.clone());
    }

    let vars = ctx.vars();
    for (name, command) in interpolate_map(&taskfile.aliases, &vars) {
        ctx.alias(name, command);
    }
    for (name, value) in interpolate_map(&taskfile.env, &vars) {
        ctx.export(name, value);
    }

    let library = Arc::new(ScriptLibrary::from_taskfile(taskfile)?);
    library.run_main(ctx).await?;

    let mut registry = TaskRegistry::new(source);
    for (name, def) in taskfile.task_defs() {
        let mut task = library_task(&library, name);
        if let Some(desc) = &def.desc {
            task = task.with_description(desc.clone());
        }
        registry.register(task);
    }

    if let Some(DefaultTask::Name(name)) = &taskfile.default {
        if let Some(task) = registry.get(name).cloned() {
            registry.set_default(task);
        }
    }

    tracing::debug!(
        source,
        tasks = registry.len(),
        default = registry.default_task().is_some(),
        "module evaluated"
    );
    Ok(registry)
}

/// A registry task that runs the named script of `library`
fn library_task(library: &Arc<ScriptLibrary>, name: &str) -> Task {
    let library = Arc::clone(library);
    let script_name = name.to_string();
    Task::new(name, move |ctx: &ExecutionContext| {
        let library = Arc::clone(&library);
        let script_name = script_name.clone();
        async move { library.run_task(ctx, &script_name, Vec::new()).await }.boxed()
    })
}
