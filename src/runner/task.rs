//! Task execution
//!
//! Every task moves through `Pending → Resolving → Mapping → Invoking` and
//! ends `Completed` or `Failed`. The executor resolves the task's options and
//! file rules, expands them into mappings, and hands each mapping to the
//! capability registered for the task's kind. It never writes files itself.

use crate::config::Project;
use crate::error::{is_cancelled, ConfigError, ConfigResult, ExecutionError, ExecutionResult, InterpolationResult};
use crate::runner::capability::{Capability, TaskOptions};
use crate::runner::mapping::{MappingRule, ResolvedMapping};
use crate::runner::registry::TaskDefinition;
use crate::runner::Context;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, error, info};

/// Lifecycle of a single task run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Resolving,
    Mapping,
    Invoking,
    Completed,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Resolving => "resolving",
            TaskState::Mapping => "mapping",
            TaskState::Invoking => "invoking",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of one task
#[derive(Debug)]
pub struct TaskReport {
    pub name: String,
    pub state: TaskState,

    /// Number of mappings the task produced
    pub mappings: usize,

    /// Failures, in mapping order
    pub errors: Vec<ExecutionError>,
}

impl TaskReport {
    fn new(name: &str) -> Self {
        TaskReport {
            name: name.to_string(),
            state: TaskState::Pending,
            mappings: 0,
            errors: Vec::new(),
        }
    }

    fn transition(&mut self, state: TaskState) {
        debug!(task = %self.name, from = %self.state, to = %state, "task state");
        self.state = state;
    }

    fn fail(mut self, err: ExecutionError) -> Self {
        self.errors.push(err);
        self.transition(TaskState::Failed);
        self
    }

    pub fn is_success(&self) -> bool {
        self.state == TaskState::Completed
    }

    /// Whether the task stopped because the run was cancelled
    pub fn was_cancelled(&self) -> bool {
        self.errors.iter().any(is_cancelled)
    }
}

/// Outcome of running a task or an alias
#[derive(Debug, Default)]
pub struct RunReport {
    /// Tasks that ran, in order
    pub tasks: Vec<TaskReport>,

    /// Tasks that never started because an earlier one failed
    pub skipped: Vec<String>,

    pub cancelled: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.tasks.iter().all(TaskReport::is_success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| !t.is_success())
    }
}

/// Runs tasks of a loaded project
#[derive(Debug, Clone, Copy)]
pub struct Executor<'a> {
    project: &'a Project,
    ctx: &'a Context,
}

impl<'a> Executor<'a> {
    pub fn new(project: &'a Project, ctx: &'a Context) -> Self {
        Executor { project, ctx }
    }

    pub fn project(&self) -> &'a Project {
        self.project
    }

    pub fn context(&self) -> &'a Context {
        self.ctx
    }

    /// Run a task or an alias
    pub fn run(&self, name: &str) -> ConfigResult<RunReport> {
        self.run_sequence(&[name.to_string()])
    }

    /// Run several tasks or aliases one after another
    ///
    /// Every name is expanded up front, so an unknown name fails before any
    /// task starts. The sequence halts at the first failed task.
    pub fn run_sequence(&self, names: &[String]) -> ConfigResult<RunReport> {
        let mut order = Vec::new();
        for name in names {
            order.extend(self.project.registry.resolve_alias(name)?);
        }

        let mut report = RunReport::default();
        let mut remaining = order.into_iter();

        for name in remaining.by_ref() {
            let task = self
                .project
                .registry
                .get(&name)
                .ok_or_else(|| ConfigError::TaskNotFound(name.clone()))?;

            let task_report = self.run_task(task);
            let failed = !task_report.is_success();
            report.cancelled |= task_report.was_cancelled();
            report.tasks.push(task_report);

            if failed || self.ctx.is_cancelled() {
                report.cancelled |= self.ctx.is_cancelled();
                break;
            }
        }

        report.skipped = remaining.collect();
        if !report.skipped.is_empty() {
            info!("skipping: {}", report.skipped.join(", "));
        }
        Ok(report)
    }

    /// Run one task through its full lifecycle
    pub fn run_task(&self, task: &TaskDefinition) -> TaskReport {
        let mut report = TaskReport::new(&task.name);
        info!(task = %task.name, kind = %task.kind, "running task");

        report.transition(TaskState::Resolving);
        let Some(capability) = self.project.capabilities.get(&task.kind) else {
            return report.fail(
                ConfigError::UnknownCapability {
                    task: task.name.clone(),
                    kind: task.kind.clone(),
                }
                .into(),
            );
        };
        let (options, rules) = match self.resolve(task) {
            Ok(resolved) => resolved,
            Err(e) => return report.fail(e.into()),
        };

        report.transition(TaskState::Mapping);
        let mut mappings = Vec::new();
        for rule in &rules {
            match rule.mappings(&self.project.root) {
                Ok(found) => mappings.extend(found),
                Err(e) => return report.fail(e.into()),
            }
        }
        report.mappings = mappings.len();
        if mappings.is_empty() {
            info!(task = %task.name, "no files matched");
        }

        report.transition(TaskState::Invoking);
        let results = self.invoke_all(capability.as_ref(), &mappings, &options);
        for (mapping, result) in mappings.iter().zip(results) {
            if let Err(e) = result {
                error!(task = %task.name, "{}: {}", mapping, e);
                report.errors.push(ExecutionError::MappingInvocation {
                    mapping: mapping.to_string(),
                    source: Box::new(e),
                });
            }
        }

        if report.errors.is_empty() {
            report.transition(TaskState::Completed);
            info!(task = %task.name, mappings = report.mappings, "task completed");
        } else {
            report.transition(TaskState::Failed);
        }
        report
    }

    fn resolve(&self, task: &TaskDefinition) -> InterpolationResult<(TaskOptions, Vec<MappingRule>)> {
        let ctx = &self.project.context;
        let options = match ctx.resolve_value(&Value::Mapping(task.options.clone()))? {
            Value::Mapping(m) => m,
            _ => Mapping::new(),
        };
        let rules = task
            .files
            .iter()
            .map(|rule| MappingRule::resolve(rule, ctx))
            .collect::<InterpolationResult<Vec<_>>>()?;
        Ok((TaskOptions::new(options), rules))
    }

    /// Invoke the capability for every mapping; results come back in mapping order
    fn invoke_all(
        &self,
        capability: &dyn Capability,
        mappings: &[ResolvedMapping],
        options: &TaskOptions,
    ) -> Vec<ExecutionResult<()>> {
        let workers = self.ctx.jobs.min(mappings.len());
        if workers <= 1 {
            return mappings
                .iter()
                .map(|mapping| self.invoke_one(capability, mapping, options))
                .collect();
        }

        let next = AtomicUsize::new(0);
        let next = &next;
        let mut results: Vec<Option<ExecutionResult<()>>> = (0..mappings.len()).map(|_| None).collect();

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                handles.push(scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::SeqCst);
                        let Some(mapping) = mappings.get(i) else {
                            break;
                        };
                        done.push((i, self.invoke_one(capability, mapping, options)));
                    }
                    done
                }));
            }

            for handle in handles {
                if let Ok(done) = handle.join() {
                    for (i, result) in done {
                        results[i] = Some(result);
                    }
                }
            }
        });

        results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| Err(ExecutionError::Invocation("worker thread panicked".to_string())))
            })
            .collect()
    }

    fn invoke_one(
        &self,
        capability: &dyn Capability,
        mapping: &ResolvedMapping,
        options: &TaskOptions,
    ) -> ExecutionResult<()> {
        if self.ctx.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        debug!(mapping = %mapping, "invoking");
        capability.invoke(mapping, options)
    }
}
