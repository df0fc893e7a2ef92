//! Task registry and dispatch
//!
//! A registry maps task names to async callables, with an optional default
//! task. Dispatching runs the requested tasks concurrently on the current
//! thread and waits for all of them before reporting the first failure.

use crate::config::DEFAULT_TASK;
use crate::error::{DispatchError, Result};
use crate::runner::{ExecutionContext, Verbosity};
use colored::Colorize;
use futures::future::{join_all, BoxFuture};
use std::fmt;
use std::sync::Arc;

/// Future returned by a task invocation
pub type TaskFuture<'a> = BoxFuture<'a, Result<()>>;

/// The callable behind a task
pub type TaskFn = Arc<dyn for<'a> Fn(&'a ExecutionContext) -> TaskFuture<'a> + Send + Sync>;

/// A named, invokable task
#[derive(Clone)]
pub struct Task {
    pub name: String,
    pub description: Option<String>,
    action: TaskFn,
}

impl Task {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: for<'a> Fn(&'a ExecutionContext) -> TaskFuture<'a> + Send + Sync + 'static,
    {
        Task {
            name: name.into(),
            description: None,
            action: Arc::new(action),
        }
    }

    /// Attach a description shown when listing tasks
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The same callable under another name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Task {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Start the task
    pub fn invoke<'a>(&self, ctx: &'a ExecutionContext) -> TaskFuture<'a> {
        (self.action)(ctx)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Tasks chosen for one dispatch
#[derive(Debug)]
pub enum Selection<'a> {
    Default(&'a Task),
    Named(Vec<&'a Task>),
}

/// Named tasks of a loaded Taskfile
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    /// Where the tasks came from, used in messages
    pub source: String,
    tasks: Vec<Task>,
    default: Option<Task>,
}

impl TaskRegistry {
    pub fn new(source: impl Into<String>) -> Self {
        TaskRegistry {
            source: source.into(),
            tasks: Vec::new(),
            default: None,
        }
    }

    /// Add a task, replacing any task with the same name.
    ///
    /// A task named `default` becomes the default task.
    pub fn register(&mut self, task: Task) {
        if task.name == DEFAULT_TASK {
            self.default = Some(task);
            return;
        }
        match self.tasks.iter_mut().find(|t| t.name == task.name) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    /// Builder form of [`TaskRegistry::register`]
    pub fn with_task(mut self, task: Task) -> Self {
        self.register(task);
        self
    }

    pub fn set_default(&mut self, task: Task) {
        self.default = Some(task.renamed(DEFAULT_TASK));
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn default_task(&self) -> Option<&Task> {
        self.default.as_ref()
    }

    /// Listable tasks, in registration order. Never includes the default.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Lines printed by `dx --tasks`
    pub fn listing(&self) -> Vec<String> {
        let mut lines = vec!["Available tasks:".to_string()];
        lines.extend(self.tasks.iter().map(|task| match &task.description {
            Some(desc) => format!("  {} # {}", task.name, desc),
            None => format!("  {}", task.name),
        }));
        lines
    }

    /// Pick the tasks to run for the requested names
    pub fn select(
        &self,
        requested: &[String],
    ) -> std::result::Result<Selection<'_>, DispatchError> {
        if requested.is_empty() {
            return self
                .default_task()
                .map(Selection::Default)
                .ok_or_else(|| DispatchError::NoDefaultTask(self.source.clone()));
        }

        let mut selected = Vec::new();
        for name in requested {
            match self.get(name) {
                Some(task) => selected.push(task),
                None => {
                    tracing::warn!(task = %name, source = %self.source, "task not found, skipping")
                }
            }
        }

        if selected.is_empty() {
            return Err(DispatchError::NoMatchingTask {
                requested: requested.to_vec(),
                taskfile: self.source.clone(),
            });
        }
        Ok(Selection::Named(selected))
    }

    /// Run the requested tasks, or the default task when none is requested.
    ///
    /// Named tasks are started in the order given and run concurrently. All
    /// of them run to completion; the first failure in request order is
    /// returned.
    pub async fn dispatch(&self, ctx: &ExecutionContext, requested: &[String]) -> Result<()> {
        match self.select(requested)? {
            Selection::Default(task) => {
                print_task_header(ctx, &task.name);
                task.invoke(ctx).await
            }
            Selection::Named(tasks) => {
                let runs = tasks.iter().map(|task| {
                    print_task_header(ctx, &task.name);
                    task.invoke(ctx)
                });
                let results = join_all(runs).await;

                let mut first_error = None;
                for (task, result) in tasks.iter().zip(results) {
                    if let Err(e) = result {
                        tracing::error!(task = %task.name, error = %e, "task failed");
                        first_error.get_or_insert(e);
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
        }
    }
}

fn print_task_header(ctx: &ExecutionContext, name: &str) {
    if ctx.verbosity >= Verbosity::Normal {
        println!("{}", format!("===Task: {}", name).bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DxError, ProcessFailure};
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(name: &str, counter: Arc<AtomicUsize>) -> Task {
        Task::new(name, move |_ctx: &ExecutionContext| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
    }

    fn failing_task(name: &str, exit_code: i32) -> Task {
        Task::new(name, move |_ctx: &ExecutionContext| {
            async move {
                Err(DxError::from(ProcessFailure {
                    exit_code,
                    stdout: String::new(),
                    stderr: String::new(),
                }))
            }
            .boxed()
        })
    }

    fn quiet_ctx() -> ExecutionContext {
        ExecutionContext::new().with_verbosity(Verbosity::Quiet)
    }

    #[test]
    fn test_register_default_by_name() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = TaskRegistry::new("Taskfile.yml")
            .with_task(counting_task("default", counter.clone()))
            .with_task(counting_task("build", counter));
        assert!(registry.default_task().is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.get("default").is_none());
    }

    #[test]
    fn test_listing_excludes_default() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new("Taskfile.yml")
            .with_task(counting_task("hello", counter.clone()).with_description("Hello task"))
            .with_task(counting_task("first", counter.clone()));
        registry.set_default(counting_task("hello", counter));

        assert_eq!(
            registry.listing(),
            vec!["Available tasks:", "  hello # Hello task", "  first"]
        );
    }

    #[test]
    fn test_register_replaces_same_name() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = TaskRegistry::new("Taskfile.yml")
            .with_task(counting_task("a", counter.clone()))
            .with_task(counting_task("a", counter).with_description("second"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").and_then(|t| t.description.as_deref()), Some("second"));
    }

    #[tokio::test]
    async fn test_default_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry =
            TaskRegistry::new("Taskfile.yml").with_task(counting_task("default", counter.clone()));

        registry.dispatch(&quiet_ctx(), &[]).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_default_task() {
        let registry = TaskRegistry::new("Taskfile.yml");
        let err = registry.dispatch(&quiet_ctx(), &[]).await.unwrap_err();
        assert!(matches!(err, DxError::Dispatch(DispatchError::NoDefaultTask(_))));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_unmatched_name_fails() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry =
            TaskRegistry::new("Taskfile.yml").with_task(counting_task("default", counter.clone()));

        let err = registry
            .dispatch(&quiet_ctx(), &["missing".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, DxError::Dispatch(DispatchError::NoMatchingTask { .. })));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_names_are_skipped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry =
            TaskRegistry::new("Taskfile.yml").with_task(counting_task("a", counter.clone()));

        registry
            .dispatch(&quiet_ctx(), &["nope".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_named_tasks_all_complete() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = TaskRegistry::new("Taskfile.yml")
            .with_task(counting_task("a", counter.clone()))
            .with_task(counting_task("b", counter.clone()));

        registry
            .dispatch(&quiet_ctx(), &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_siblings() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = TaskRegistry::new("Taskfile.yml")
            .with_task(failing_task("a", 4))
            .with_task(counting_task("b", counter.clone()));

        let err = registry
            .dispatch(&quiet_ctx(), &["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.as_process_failure().map(|f| f.exit_code), Some(4));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tasks_run_concurrently() {
        // each task waits for the other to have started
        let started = Arc::new(AtomicUsize::new(0));
        let make = |name: &str| {
            let started = Arc::clone(&started);
            Task::new(name, move |_ctx: &ExecutionContext| {
                let started = Arc::clone(&started);
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    while started.load(Ordering::SeqCst) < 2 {
                        tokio::task::yield_now().await;
                    }
                    Ok(())
                }
                .boxed()
            })
        };
        let registry = TaskRegistry::new("Taskfile.yml")
            .with_task(make("a"))
            .with_task(make("b"));

        registry
            .dispatch(&quiet_ctx(), &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
    }
}
