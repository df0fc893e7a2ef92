//! dx - shell scripting and task running from YAML
//!
//! dx runs shell commands with persistent aliases, environment and working
//! directory, and dispatches named tasks from a `Taskfile.yml`.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;

// Re-export commonly used types
pub use error::{DxError, Result};

/// Current version of dx
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
