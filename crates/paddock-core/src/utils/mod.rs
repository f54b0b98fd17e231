//! Utility functions for display formatting.

pub mod format;

pub use format::{format_session_date, truncate_string};
