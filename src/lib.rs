//! Course Market - backend for an online course marketplace.
//!
//! Instructors publish video courses; students browse, buy them through
//! Stripe Checkout (or enroll for free), watch lessons and track progress,
//! and leave reviews. PostgreSQL is the source of truth; every write is
//! mirrored into a JSON document store that serves full-text search.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Core business entities and rules
//! - **services**: Application use cases
//! - **infra**: Database, Redis, document store and Stripe
//! - **api**: HTTP handlers, middleware, and routes
//! - **types**: Shared types (pagination)
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! course-market serve
//!
//! # Run migrations
//! course-market migrate up
//!
//! # Rebuild the document store
//! course-market sync --collection courses
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod services;
pub mod types;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{Password, User, UserRole};
pub use errors::{AppError, AppResult};
pub use infra::Cache;
