//! Command and task execution engine
//!
//! This module compiles command templates, runs them through the configured
//! shell, and loads, registers and dispatches tasks.

pub mod command;
pub mod context;
pub mod interpolate;
pub mod lines;
pub mod module;
pub mod step;
pub mod task;
pub mod template;

// Re-export main types
pub use command::*;
pub use context::*;
pub use interpolate::*;
pub use lines::*;
pub use module::*;
pub use step::*;
pub use task::*;
pub use template::*;
