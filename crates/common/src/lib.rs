//! Shared infrastructure for the weft workspace.
//!
//! Provides the per-module debug loggers and the line/column index used
//! when rendering parse diagnostics.

pub mod debug;
pub mod source;

pub use debug::{create_logger, Logger};
pub use source::LineIndex;
