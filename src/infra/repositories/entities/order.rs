//! Order header; line items live in `order_items`.

use sea_orm::entity::prelude::*;

use crate::domain::{Order, OrderItem, OrderStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub amount_total_cents: i64,
    pub currency: String,
    #[sea_orm(unique)]
    pub stripe_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub fulfilled_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_domain(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            status: OrderStatus::from(self.status.as_str()),
            amount_total_cents: self.amount_total_cents,
            currency: self.currency,
            stripe_session_id: self.stripe_session_id,
            payment_intent_id: self.payment_intent_id,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
            fulfilled_at: self.fulfilled_at,
        }
    }
}
