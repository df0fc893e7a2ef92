//! CLI interface and argument parsing
//!
//! This module handles command-line parsing, logging setup, and shell
//! completion.

pub mod app;
pub mod completion;
pub mod logging;

// Re-export main types
pub use app::*;
pub use completion::*;
pub use logging::*;
