//! Registry of task definitions and aliases

use crate::config::{self, FileRule};
use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Mapping;
use std::collections::BTreeMap;

/// A named unit of work bound to one capability
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    /// Task name
    pub name: String,

    /// Capability kind that performs the work
    pub kind: String,

    /// Usage description
    pub usage: Option<String>,

    /// Unresolved capability options
    pub options: Mapping,

    /// Unresolved file rules
    pub files: Vec<FileRule>,
}

impl TaskDefinition {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        TaskDefinition {
            name: name.into(),
            kind: kind.into(),
            usage: None,
            options: Mapping::new(),
            files: Vec::new(),
        }
    }

    /// Create a task definition from configuration
    pub fn from_config(name: String, config: config::Task) -> Self {
        TaskDefinition {
            name,
            kind: config.kind,
            usage: config.usage,
            options: config.options,
            files: config.files,
        }
    }
}

/// Tasks and aliases by name; the two share one namespace
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, TaskDefinition>,
    aliases: BTreeMap<String, Vec<String>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; fails if the name is already used
    pub fn register(&mut self, definition: TaskDefinition) -> ConfigResult<()> {
        if self.contains(&definition.name) {
            return Err(ConfigError::DuplicateTask(definition.name));
        }
        self.tasks.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Register an alias; members are checked when resolved
    pub fn register_alias(&mut self, name: impl Into<String>, members: Vec<String>) -> ConfigResult<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(ConfigError::DuplicateTask(name));
        }
        self.aliases.insert(name, members);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name) || self.aliases.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.values()
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.aliases.iter()
    }

    /// Expand a task or alias name into the ordered list of task names to run
    ///
    /// Nested aliases are expanded depth-first. A name seen again on the
    /// current expansion path is a cycle.
    pub fn resolve_alias(&self, name: &str) -> ConfigResult<Vec<String>> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.expand_into(name, &mut stack, &mut out)?;
        Ok(out)
    }

    /// Check that every alias expands without cycles or unknown names
    pub fn validate_aliases(&self) -> ConfigResult<()> {
        for name in self.aliases.keys() {
            self.resolve_alias(name)?;
        }
        Ok(())
    }

    fn expand_into(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> ConfigResult<()> {
        if stack.iter().any(|n| n == name) {
            stack.push(name.to_string());
            return Err(ConfigError::CyclicAlias(stack.join(" -> ")));
        }

        if self.tasks.contains_key(name) {
            out.push(name.to_string());
            return Ok(());
        }

        let members = self
            .aliases
            .get(name)
            .ok_or_else(|| ConfigError::TaskNotFound(name.to_string()))?;

        stack.push(name.to_string());
        for member in members {
            self.expand_into(member, stack, out)?;
        }
        stack.pop();

        Ok(())
    }
}
