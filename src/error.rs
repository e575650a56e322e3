//! Error types for assetflow

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for assetflow operations
pub type Result<T> = std::result::Result<T, AssetflowError>;

/// Main error type for assetflow
#[derive(Error, Debug)]
pub enum AssetflowError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Variable interpolation errors
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// One or more tasks failed during a run
    #[error("Run failed: {0}")]
    RunFailed(String),

    /// File watcher setup errors
    #[error("Watch error: {0}")]
    Watch(#[from] anyhow::Error),
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Failed to load '{path}': {error}")]
    Load { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("{location}: {source}")]
    Template {
        location: String,
        #[source]
        source: InterpolationError,
    },

    #[error("Task or alias '{0}' is already registered")]
    DuplicateTask(String),

    #[error("Cyclic alias detected: {0}")]
    CyclicAlias(String),

    #[error("Task '{0}' is not defined")]
    TaskNotFound(String),

    #[error("Task '{task}' uses unknown capability '{kind}'")]
    UnknownCapability { task: String, kind: String },

    #[error("Invalid glob pattern '{pattern}': {error}")]
    InvalidGlob { pattern: String, error: String },

    #[error("Watch binding '{binding}' pattern '{pattern}' overlaps output '{dest}' of task '{task}'")]
    WatchOverlap {
        binding: String,
        pattern: String,
        task: String,
        dest: String,
    },
}

/// Task execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command failed with exit code {0:?}")]
    CommandFailed(Option<i32>),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{mapping}: {source}")]
    MappingInvocation {
        mapping: String,
        #[source]
        source: Box<ExecutionError>,
    },

    #[error("Invocation failed: {0}")]
    Invocation(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Variable interpolation errors
#[derive(Error, Debug)]
pub enum InterpolationError {
    #[error("Variable '{0}' is not defined")]
    UnknownVariable(String),

    #[error("Variable '{0}' refers to a mapping, not a value")]
    NotScalar(String),

    #[error("Invalid interpolation syntax: {0}")]
    InvalidSyntax(String),

    #[error("Cyclic reference while resolving '{0}'")]
    CyclicReference(String),
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;

impl ExecutionError {
    /// Wrap an I/O error with a short description of what was attempted
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        ExecutionError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Helper function to determine if an error came from cancellation
/// (reported separately from real failures)
pub fn is_cancelled(err: &ExecutionError) -> bool {
    match err {
        ExecutionError::Cancelled => true,
        ExecutionError::MappingInvocation { source, .. } => is_cancelled(source),
        _ => false,
    }
}
