//! Configuration validation and project assembly
//!
//! A [`Project`] is everything built once per process from the configuration
//! document: the variable context, the task registry, the capability
//! registry, and the watch bindings. Every check that can fail does so here,
//! before any task runs.

use crate::config::parse::{load_env_file, parse_config_file};
use crate::config::resolve::{resolve_list, ConfigContext};
use crate::config::types::{Config, WatchOptions};
use crate::error::{ConfigError, ConfigResult, InterpolationError};
use crate::runner::command::{default_interpreter, CommandCapability};
use crate::runner::glob::compile;
use crate::runner::mapping::MappingRule;
use crate::runner::registry::{TaskDefinition, TaskRegistry};
use crate::runner::watch::WatchBinding;
use crate::runner::CapabilityRegistry;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A validated, ready-to-run configuration
#[derive(Debug, Clone)]
pub struct Project {
    pub name: Option<String>,

    /// Directory holding the configuration file; rule paths are relative to it
    pub root: PathBuf,

    pub context: ConfigContext,
    pub registry: TaskRegistry,
    pub capabilities: CapabilityRegistry,

    /// Usage text of configured capabilities, by kind
    pub capability_usage: BTreeMap<String, String>,

    pub watch: Vec<WatchBinding>,
    pub watch_options: WatchOptions,

    /// Mapping parallelism requested by the configuration
    pub jobs: Option<usize>,
}

/// Load, validate and assemble the project described by a config file
///
/// A `.env` file next to the configuration is loaded first so `env.*`
/// placeholders can see it.
pub fn load_project(path: &Path) -> ConfigResult<Project> {
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));

    load_env_file(&root)?;
    let config = parse_config_file(path)?;
    build_project(config, root)
}

/// Assemble a project with the built-in capabilities
pub fn build_project(config: Config, root: PathBuf) -> ConfigResult<Project> {
    build_project_with(config, root, CapabilityRegistry::with_builtins())
}

/// Assemble a project on top of an existing capability registry
pub fn build_project_with(
    config: Config,
    root: PathBuf,
    mut capabilities: CapabilityRegistry,
) -> ConfigResult<Project> {
    let interpreter = config.interpreter.unwrap_or_else(default_interpreter);

    let mut capability_usage = BTreeMap::new();
    for (kind, capability) in config.capabilities {
        if capability.command.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "capability '{}' has an empty command",
                kind
            )));
        }
        capabilities.register(
            kind.clone(),
            CommandCapability::new(capability.command, interpreter.clone(), root.clone()),
        )?;
        if let Some(usage) = capability.usage {
            capability_usage.insert(kind, usage);
        }
    }

    let context = ConfigContext::new(config.vars);

    let mut registry = TaskRegistry::new();
    for (name, task) in config.tasks {
        let definition = TaskDefinition::from_config(name, task);
        validate_task(&definition, &context, &capabilities)?;
        registry.register(definition)?;
    }
    for (name, members) in config.aliases {
        registry.register_alias(name, members)?;
    }
    registry.validate_aliases()?;

    let mut watch = Vec::with_capacity(config.watch.bindings.len());
    for (name, binding) in config.watch.bindings {
        if watch.iter().any(|b: &WatchBinding| b.name == name) {
            return Err(ConfigError::Invalid(format!(
                "watch binding '{}' is defined more than once",
                name
            )));
        }
        let patterns = resolve_list(&binding.files, &context)
            .map_err(|e| template_error(format!("watch '{}' files", name), e))?;
        let binding = WatchBinding::new(name, patterns, binding.tasks)?;
        validate_binding(&binding, &registry, &context, &root)?;
        watch.push(binding);
    }

    if config.watch.options.livereload {
        warn!("watch.options.livereload is not supported and will be ignored");
    }

    debug!(
        tasks = registry.tasks().count(),
        aliases = registry.aliases().count(),
        bindings = watch.len(),
        "project loaded"
    );

    Ok(Project {
        name: config.name,
        root,
        context,
        registry,
        capabilities,
        capability_usage,
        watch,
        watch_options: config.watch.options,
        jobs: config.jobs,
    })
}

/// Check that a task's kind exists and that its templates and globs resolve
pub fn validate_task(
    task: &TaskDefinition,
    context: &ConfigContext,
    capabilities: &CapabilityRegistry,
) -> ConfigResult<()> {
    if !capabilities.contains(&task.kind) {
        return Err(ConfigError::UnknownCapability {
            task: task.name.clone(),
            kind: task.kind.clone(),
        });
    }

    context
        .resolve_value(&Value::Mapping(task.options.clone()))
        .map_err(|e| template_error(format!("task '{}' options", task.name), e))?;

    for (i, rule) in task.files.iter().enumerate() {
        let resolved = MappingRule::resolve(rule, context)
            .map_err(|e| template_error(format!("task '{}' files[{}]", task.name, i), e))?;

        if resolved.includes.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "task '{}' files[{}] has no source patterns",
                task.name, i
            )));
        }
        for pattern in resolved.includes.iter().chain(&resolved.excludes) {
            compile(pattern)?;
        }
    }

    Ok(())
}

/// Reject bindings whose tasks write into the binding's own watched paths
fn validate_binding(
    binding: &WatchBinding,
    registry: &TaskRegistry,
    context: &ConfigContext,
    root: &Path,
) -> ConfigResult<()> {
    if binding.tasks.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "watch '{}' has no tasks",
            binding.name
        )));
    }

    for name in &binding.tasks {
        for task_name in registry.resolve_alias(name)? {
            let Some(task) = registry.get(&task_name) else {
                return Err(ConfigError::TaskNotFound(task_name));
            };
            for rule in &task.files {
                let rule = MappingRule::resolve(rule, context)
                    .map_err(|e| template_error(format!("task '{}' files", task.name), e))?;
                if let Some((pattern, dest)) = binding.overlaps(&rule, root) {
                    return Err(ConfigError::WatchOverlap {
                        binding: binding.name.clone(),
                        pattern,
                        task: task.name.clone(),
                        dest,
                    });
                }
            }
        }
    }

    Ok(())
}

fn template_error(location: String, source: InterpolationError) -> ConfigError {
    ConfigError::Template { location, source }
}
