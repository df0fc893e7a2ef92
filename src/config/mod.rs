//! Taskfile loading and validation
//!
//! This module handles discovery of Taskfiles, resolution of script
//! references to loadable modules, and validation of their structure.

pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use schema::*;
pub use types::*;
