//! CLI module - Command-line interface for the application.
//!
//! Provides commands for:
//! - `serve` - Start the HTTP server
//! - `migrate` - Database migrations
//! - `sync` - Rebuild the document store from the database

pub mod args;

pub use args::{Cli, Commands};
