//! Assetflow - a declarative front-end asset pipeline runner
//!
//! Tasks are declared in an `assetflow.yml` file: templated path variables,
//! glob-based file mapping rules, and the capability each task invokes.
//! Tasks run by name or through aliases, and watch mode re-runs them when
//! their inputs change.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod runner;

// Re-export commonly used types
pub use error::{AssetflowError, Result};

/// Current version of Assetflow
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
