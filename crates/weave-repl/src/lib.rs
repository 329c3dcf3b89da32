//! Weave REPL - Interactive inspector for mixin configurations
//!
//! This crate loads JSON manifests describing a type model and its mixin
//! configuration, and provides REPL commands to inspect resolved class
//! contexts and target class definitions.

pub mod manifest;
pub mod repl;

// Re-export commonly used types for convenience
pub use manifest::{LoadedManifest, Manifest};
pub use repl::{
    BufferedNotifier, DefaultNotifier, Repl, ReplCommand, ReplNotifier, ValidationEntry,
    ValidationReport,
};
