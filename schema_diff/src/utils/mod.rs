//! Utilities for schema_diff
//!
//! This module provides utility functions used across the library.

pub mod escape;
pub mod logging;

// Re-export key utility functions
pub use escape::{escape_id, escape_list, escape_qualified, quote_literal};
