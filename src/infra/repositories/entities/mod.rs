//! SeaORM entity definitions
//!
//! These are database-specific entities separate from domain models.

pub mod cart_item;
pub mod category;
pub mod course;
pub mod enrollment;
pub mod lesson;
pub mod lesson_progress;
pub mod order;
pub mod order_item;
pub mod review;
pub mod user;
pub mod webhook_event;
