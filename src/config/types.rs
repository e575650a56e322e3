//! Core configuration types
//!
//! This module defines the data structures that represent an assetflow.yml configuration file.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Index;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Project name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Values referenced from templates as `<%= key.path %>`
    #[serde(default)]
    pub vars: Mapping,

    /// Global interpreter used by command capabilities (e.g., ["sh", "-c"])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,

    /// Number of mappings a task may process at once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// Command-backed capabilities, keyed by task kind
    #[serde(default)]
    pub capabilities: NamedMap<CapabilityConfig>,

    /// Tasks defined in the configuration
    #[serde(default)]
    pub tasks: NamedMap<Task>,

    /// Named ordered task lists
    #[serde(default, deserialize_with = "deserialize_aliases")]
    pub aliases: NamedMap<Vec<String>>,

    /// Watch mode settings and bindings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// A capability implemented by an external command
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CapabilityConfig {
    /// Command template, run once per mapping
    pub command: String,

    /// Usage description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
}

/// A task definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Task {
    /// Capability that performs the work (copy, concat, or a configured command)
    pub kind: String,

    /// Usage description for listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Options handed to the capability; may contain placeholders
    #[serde(default)]
    pub options: Mapping,

    /// File mapping rules
    #[serde(default, deserialize_with = "deserialize_rules")]
    pub files: Vec<FileRule>,
}

/// A file mapping rule
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileRule {
    /// Base directory for the source patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Source patterns; entries starting with `!` exclude
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub src: Vec<String>,

    /// Destination directory (expand) or file (compact)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,

    /// Replacement extension for destination file names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,

    /// Which dot starts the replaced extension
    #[serde(default)]
    pub ext_dot: ExtDot,

    /// Drop the directory structure under `cwd`
    #[serde(default)]
    pub flatten: bool,

    /// One mapping per source (true) or all sources into `dest` (false)
    #[serde(default = "default_expand")]
    pub expand: bool,
}

fn default_expand() -> bool {
    true
}

/// Where the extension of a file name starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtDot {
    #[default]
    First,
    Last,
}

/// Watch section: shared options plus named bindings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub options: WatchOptions,

    /// Bindings keyed by name
    #[serde(flatten)]
    pub bindings: NamedMap<WatchBindingConfig>,
}

/// Options for watch mode
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchOptions {
    /// Quiet period in milliseconds before a run starts
    #[serde(default = "default_debounce")]
    pub debounce: u64,

    /// Accepted for compatibility; live reload is not provided
    #[serde(default)]
    pub livereload: bool,
}

fn default_debounce() -> u64 {
    100
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            debounce: default_debounce(),
            livereload: false,
        }
    }
}

/// A single watch binding
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchBindingConfig {
    /// Watched path patterns
    #[serde(deserialize_with = "deserialize_string_list")]
    pub files: Vec<String>,

    /// Tasks or aliases to run on change
    #[serde(deserialize_with = "deserialize_string_list")]
    pub tasks: Vec<String>,
}

/// Named entries in document order
///
/// Unlike a map, a name written twice is kept twice, so the registries that
/// consume these sections can reject the duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for NamedMap<T> {
    fn default() -> Self {
        NamedMap {
            entries: Vec::new(),
        }
    }
}

impl<T> NamedMap<T> {
    pub fn push(&mut self, name: impl Into<String>, value: T) {
        self.entries.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with this name
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl<T> Index<&str> for NamedMap<T> {
    type Output = T;

    fn index(&self, name: &str) -> &T {
        match self.get(name) {
            Some(value) => value,
            None => panic!("no entry named '{}'", name),
        }
    }
}

impl<T> IntoIterator for NamedMap<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for NamedMap<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct NamedMapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> serde::de::Visitor<'de> for NamedMapVisitor<T> {
            type Value = NamedMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of names to definitions")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(NamedMap::default())
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut map = NamedMap::default();
                while let Some((name, value)) = access.next_entry::<String, T>()? {
                    map.push(name, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(NamedMapVisitor(PhantomData))
    }
}

impl<T: Serialize> Serialize for NamedMap<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Custom deserializer for fields that accept a single string or a list of strings
fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single string
        Value::String(s) => Ok(vec![s]),
        // Array of strings
        Value::Sequence(seq) => {
            let mut items = Vec::new();
            for item in seq {
                match item {
                    Value::String(s) => items.push(s),
                    other => {
                        return Err(D::Error::custom(format!(
                            "expected a string, found {:?}",
                            other
                        )))
                    }
                }
            }
            Ok(items)
        }
        // Null or not present
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("expected a string or array of strings")),
    }
}

/// Custom deserializer for file rules that handles both a single rule and an array
fn deserialize_rules<'de, D>(deserializer: D) -> Result<Vec<FileRule>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Mapping(_) => {
            let rule = FileRule::deserialize(value).map_err(D::Error::custom)?;
            Ok(vec![rule])
        }
        Value::Sequence(seq) => {
            let mut rules = Vec::new();
            for item in seq {
                let rule = FileRule::deserialize(item).map_err(D::Error::custom)?;
                rules.push(rule);
            }
            Ok(rules)
        }
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("files must be a rule or array of rules")),
    }
}

/// Custom deserializer for aliases whose members may be a single name or a list
fn deserialize_aliases<'de, D>(deserializer: D) -> Result<NamedMap<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let raw = NamedMap::<Value>::deserialize(deserializer)?;
    let mut aliases = NamedMap::default();

    for (name, value) in raw {
        let members = match value {
            Value::String(s) => vec![s],
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(D::Error::custom(format!(
                        "alias '{}' must list task names",
                        name
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                return Err(D::Error::custom(format!(
                    "alias '{}' must be a string or array",
                    name
                )))
            }
        };
        aliases.push(name, members);
    }

    Ok(aliases)
}
