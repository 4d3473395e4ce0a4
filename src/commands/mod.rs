//! Commands module - CLI command implementations.
//!
//! Each command is implemented in its own module for separation of concerns.

pub mod migrate;
pub mod serve;
pub mod sync;

use crate::errors::AppError;

/// Wrap a startup failure with the component that failed.
pub(crate) fn connection_error<E: std::fmt::Display>(
    component: &'static str,
) -> impl FnOnce(E) -> AppError {
    move |e| AppError::internal(format!("{} connection failed: {}", component, e))
}
