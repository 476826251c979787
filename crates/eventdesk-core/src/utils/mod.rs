//! Utility functions for string formatting and manipulation.

pub mod format;

pub use format::{non_blank, truncate_string};
