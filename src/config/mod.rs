//! Configuration parsing and validation
//!
//! This module handles parsing of assetflow.yml configuration files,
//! template resolution, and validation of the loaded project.

pub mod parse;
pub mod resolve;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use resolve::{ConfigContext, Segment, Template};
pub use schema::*;
pub use types::*;
