//! Error handling foundation for the tollgate gateway.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own error enum (`AuthzError`, `FlowStoreError`,
//! ...) and returns it wrapped in a [`Report`].

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
