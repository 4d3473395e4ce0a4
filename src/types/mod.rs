//! Shared types used across layers.

mod pagination;

pub use pagination::{CoursePage, Paginated, PaginationMeta, PaginationParams, UserPage};
