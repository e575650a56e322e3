//! Capabilities: the operations a task kind performs on each mapping
//!
//! The executor never touches files itself. Every task names a kind, and the
//! [`CapabilityRegistry`] assembled at startup maps that kind to an
//! implementation of [`Capability`]. Two kinds are built in (`copy` and
//! `concat`); the rest come from `capabilities:` in the configuration and run
//! external commands (see [`crate::runner::command`]).

use crate::config::resolve::scalar_to_string;
use crate::error::{ConfigError, ConfigResult, ExecutionError, ExecutionResult};
use crate::runner::mapping::ResolvedMapping;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Default separator placed between concatenated files
const DEFAULT_SEPARATOR: &str = "\n";

/// Capability options after template resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOptions {
    values: Mapping,
}

impl TaskOptions {
    pub fn new(values: Mapping) -> Self {
        TaskOptions { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Option rendered as text, if it is a scalar
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_to_string)
    }

    /// Every scalar option as `(name, text)`
    pub fn scalars(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.values.iter().filter_map(|(k, v)| {
            let key = k.as_str()?;
            Some((key.to_string(), scalar_to_string(v)?))
        })
    }
}

/// The contract every task kind implements
///
/// Called once per mapping, possibly from several worker threads at once;
/// each call owns its mapping's destination.
pub trait Capability: Send + Sync {
    fn invoke(&self, mapping: &ResolvedMapping, options: &TaskOptions) -> ExecutionResult<()>;
}

impl<F> Capability for F
where
    F: Fn(&ResolvedMapping, &TaskOptions) -> ExecutionResult<()> + Send + Sync,
{
    fn invoke(&self, mapping: &ResolvedMapping, options: &TaskOptions) -> ExecutionResult<()> {
        self(mapping, options)
    }
}

/// Task kind → capability
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    entries: BTreeMap<String, Arc<dyn Capability>>,
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("kinds", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CapabilityRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `copy` and `concat` kinds
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.entries.insert("copy".to_string(), Arc::new(CopyCapability));
        registry.entries.insert("concat".to_string(), Arc::new(ConcatCapability));
        registry
    }

    /// Bind a kind to a capability; a kind can only be bound once
    pub fn register(&mut self, kind: impl Into<String>, capability: impl Capability + 'static) -> ConfigResult<()> {
        let kind = kind.into();
        if self.entries.contains_key(&kind) {
            return Err(ConfigError::Invalid(format!(
                "capability '{}' is already registered",
                kind
            )));
        }
        self.entries.insert(kind, Arc::new(capability));
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Capability>> {
        self.entries.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Copies each source to its destination
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyCapability;

impl Capability for CopyCapability {
    fn invoke(&self, mapping: &ResolvedMapping, _options: &TaskOptions) -> ExecutionResult<()> {
        let dest = require_dest(mapping, "copy")?;
        let source = mapping
            .source()
            .ok_or_else(|| ExecutionError::Invocation("copy needs a source file".to_string()))?;

        ensure_parent(dest)?;
        fs::copy(source, dest)
            .map_err(|e| ExecutionError::io(format!("copy {}", source.display()), e))?;
        Ok(())
    }
}

/// Joins all sources of a mapping into its destination
///
/// Options: `separator` (default newline), `banner`, `footer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatCapability;

impl Capability for ConcatCapability {
    fn invoke(&self, mapping: &ResolvedMapping, options: &TaskOptions) -> ExecutionResult<()> {
        let dest = require_dest(mapping, "concat")?;
        let separator = options
            .get_str("separator")
            .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());

        let mut parts = Vec::with_capacity(mapping.sources.len());
        for source in &mapping.sources {
            let text = fs::read_to_string(source)
                .map_err(|e| ExecutionError::io(format!("read {}", source.display()), e))?;
            parts.push(text);
        }

        let mut output = options.get_str("banner").unwrap_or_default();
        output.push_str(&parts.join(&separator));
        output.push_str(&options.get_str("footer").unwrap_or_default());

        ensure_parent(dest)?;
        fs::write(dest, output)
            .map_err(|e| ExecutionError::io(format!("write {}", dest.display()), e))?;
        Ok(())
    }
}

fn require_dest<'a>(mapping: &'a ResolvedMapping, kind: &str) -> ExecutionResult<&'a Path> {
    mapping.dest.as_deref().ok_or_else(|| {
        ExecutionError::Invocation(format!("{} needs a destination (set `dest`)", kind))
    })
}

/// Create the parent directory of an output file
pub fn ensure_parent(dest: &Path) -> ExecutionResult<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| ExecutionError::io(format!("create {}", parent.display()), e))?;
        }
    }
    Ok(())
}
