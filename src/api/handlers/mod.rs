//! HTTP request handlers.

pub mod auth_handler;
pub mod cart_handler;
pub mod category_handler;
pub mod checkout_handler;
pub mod course_handler;
pub mod enrollment_handler;
pub mod lesson_handler;
pub mod review_handler;
pub mod search_handler;
pub mod user_handler;

pub use auth_handler::auth_routes;
pub use cart_handler::cart_routes;
pub use category_handler::category_routes;
pub use checkout_handler::{checkout_routes, webhook_routes};
pub use course_handler::course_routes;
pub use enrollment_handler::enrollment_routes;
pub use lesson_handler::lesson_routes;
pub use review_handler::review_routes;
pub use search_handler::search_routes;
pub use user_handler::user_routes;
