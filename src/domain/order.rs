//! Shopping cart and orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::Course;
use crate::config::MAX_CHECKOUT_ITEMS;
use crate::errors::{AppError, AppResult};

/// A course waiting in a user's cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddCartItem {
    pub course_id: Uuid,
}

/// Cart line with the course it refers to
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLine {
    pub course: Course,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub subtotal_cents: i64,
    pub currency: String,
}

impl CartView {
    pub fn new(items: Vec<CartLine>, currency: &str) -> Self {
        let subtotal_cents = items.iter().map(|l| l.course.price_cents).sum();
        Self {
            items,
            subtotal_cents,
            currency: currency.to_string(),
        }
    }
}

/// Payment state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Expired,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Expired => "expired",
            OrderStatus::Failed => "failed",
        }
    }

    /// Only pending orders move, and never back to pending.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (
                OrderStatus::Pending,
                OrderStatus::Paid | OrderStatus::Expired | OrderStatus::Failed
            )
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        match s {
            "paid" => OrderStatus::Paid,
            "expired" => OrderStatus::Expired,
            "failed" => OrderStatus::Failed,
            _ => OrderStatus::Pending,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Course snapshot captured when the order was placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub course_id: Uuid,
    pub title: String,
    pub price_cents: i64,
}

impl From<&Course> for OrderItem {
    fn from(course: &Course) -> Self {
        Self {
            course_id: course.id,
            title: course.title.clone(),
            price_cents: course.price_cents,
        }
    }
}

/// Order entity; also the `orders` document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub amount_total_cents: i64,
    pub currency: String,
    pub stripe_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn course_ids(&self) -> Vec<Uuid> {
        self.items.iter().map(|i| i.course_id).collect()
    }
}

/// Checkout request. An empty list checks out the whole cart.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub course_ids: Vec<Uuid>,
}

/// Where to send the buyer next
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub session_id: String,
    pub checkout_url: Option<String>,
}

/// Drop repeated ids, keeping first occurrence order, and cap the count.
pub fn normalize_checkout_ids(ids: &[Uuid]) -> AppResult<Vec<Uuid>> {
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

    if unique.len() > MAX_CHECKOUT_ITEMS {
        return Err(AppError::validation(format!(
            "At most {} courses can be bought at once",
            MAX_CHECKOUT_ITEMS
        )));
    }

    Ok(unique)
}
