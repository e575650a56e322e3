//! Task execution engine
//!
//! This module expands file rules into mappings, runs tasks through their
//! capabilities, and drives watch mode.

pub mod capability;
pub mod command;
pub mod context;
pub mod glob;
pub mod interpolate;
pub mod mapping;
pub mod registry;
pub mod task;
pub mod watch;

// Re-export main types
pub use capability::{Capability, CapabilityRegistry, TaskOptions};
pub use command::CommandCapability;
pub use context::*;
pub use mapping::{MappingRule, ResolvedMapping};
pub use registry::{TaskDefinition, TaskRegistry};
pub use task::*;
pub use watch::{subscribe, ChangeEvent, ChangeKind, WatchBinding, WatchCoordinator};
