//! Orders and the fulfillment transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::entities::{
    cart_item, course, enrollment,
    order::{self, Entity as OrderEntity},
    order_item::{self, Entity as OrderItemEntity},
};
use crate::domain::{Enrollment, Order, OrderItem, OrderStatus};
use crate::errors::{AppError, AppResult};
use crate::infra::unit_of_work::{transaction, transaction_serializable};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// What `fulfill` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// The order moved from pending to paid
    Fulfilled,
    /// The order was already paid
    AlreadyFulfilled,
    /// The order had expired or failed; nothing was granted
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fulfillment {
    pub order: Order,
    pub outcome: FulfillmentOutcome,
    /// Enrollments created by this call
    pub new_enrollments: Vec<Enrollment>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert the order header and its items
    async fn create(&self, order: Order) -> AppResult<Order>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>>;

    async fn find_by_session_id(&self, session_id: &str) -> AppResult<Option<Order>>;

    /// Orders of a user, newest first
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Order>>;

    async fn list_all(&self) -> AppResult<Vec<Order>>;

    async fn attach_session(&self, id: Uuid, session_id: String) -> AppResult<Order>;

    /// Move a pending order to `status`.
    /// Returns `None` when the order was no longer pending.
    async fn transition(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>>;

    /// Mark a pending order paid, enroll the buyer in every purchased course
    /// and drop those courses from the buyer's cart, atomically.
    async fn fulfill(&self, id: Uuid, payment_intent_id: Option<String>) -> AppResult<Fulfillment>;

    /// Whether a pending or paid order contains the course
    async fn has_open_orders_for_course(&self, course_id: Uuid) -> AppResult<bool>;
}

pub struct OrderStore {
    db: DatabaseConnection,
}

impl OrderStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

async fn items_of<C: ConnectionTrait>(db: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    let models = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Title)
        .all(db)
        .await?;
    Ok(models.into_iter().map(OrderItem::from).collect())
}

/// Attach items to many order headers with a single query.
async fn with_items<C: ConnectionTrait>(db: &C, headers: Vec<order::Model>) -> AppResult<Vec<Order>> {
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in OrderItemEntity::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .order_by_asc(order_item::Column::Title)
        .all(db)
        .await?
    {
        grouped
            .entry(item.order_id)
            .or_default()
            .push(OrderItem::from(item));
    }

    Ok(headers
        .into_iter()
        .map(|h| {
            let items = grouped.remove(&h.id).unwrap_or_default();
            h.into_domain(items)
        })
        .collect())
}

#[async_trait]
impl OrderRepository for OrderStore {
    async fn create(&self, order: Order) -> AppResult<Order> {
        transaction(&self.db, move |txn| {
            Box::pin(async move {
                let header = order::ActiveModel {
                    id: Set(order.id),
                    user_id: Set(order.user_id),
                    status: Set(order.status.as_str().to_string()),
                    amount_total_cents: Set(order.amount_total_cents),
                    currency: Set(order.currency.clone()),
                    stripe_session_id: Set(order.stripe_session_id.clone()),
                    payment_intent_id: Set(order.payment_intent_id.clone()),
                    created_at: Set(order.created_at),
                    updated_at: Set(order.updated_at),
                    fulfilled_at: Set(order.fulfilled_at),
                }
                .insert(txn)
                .await?;

                let items: Vec<order_item::ActiveModel> = order
                    .items
                    .iter()
                    .map(|item| order_item::ActiveModel {
                        order_id: Set(order.id),
                        course_id: Set(item.course_id),
                        title: Set(item.title.clone()),
                        price_cents: Set(item.price_cents),
                    })
                    .collect();
                if !items.is_empty() {
                    OrderItemEntity::insert_many(items).exec(txn).await?;
                }

                Ok(header.into_domain(order.items))
            })
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>> {
        match OrderEntity::find_by_id(id).one(&self.db).await? {
            Some(header) => {
                let items = items_of(&self.db, header.id).await?;
                Ok(Some(header.into_domain(items)))
            }
            None => Ok(None),
        }
    }

    async fn find_by_session_id(&self, session_id: &str) -> AppResult<Option<Order>> {
        let header = OrderEntity::find()
            .filter(order::Column::StripeSessionId.eq(session_id))
            .one(&self.db)
            .await?;

        match header {
            Some(header) => {
                let items = items_of(&self.db, header.id).await?;
                Ok(Some(header.into_domain(items)))
            }
            None => Ok(None),
        }
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let headers = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&self.db)
            .await?;
        with_items(&self.db, headers).await
    }

    async fn list_all(&self) -> AppResult<Vec<Order>> {
        let headers = OrderEntity::find().all(&self.db).await?;
        with_items(&self.db, headers).await
    }

    async fn attach_session(&self, id: Uuid, session_id: String) -> AppResult<Order> {
        let header = OrderEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: order::ActiveModel = header.into();
        active.stripe_session_id = Set(Some(session_id));
        active.updated_at = Set(chrono::Utc::now());
        let header = active.update(&self.db).await?;

        let items = items_of(&self.db, id).await?;
        Ok(header.into_domain(items))
    }

    async fn transition(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
        if !OrderStatus::Pending.can_transition_to(status) {
            return Err(AppError::internal(format!(
                "Illegal order transition to {}",
                status
            )));
        }

        // Conditional update: only a pending row moves
        let result = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(status.as_str()))
            .col_expr(order::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(order::Column::Id.eq(id))
            .filter(order::Column::Status.eq(OrderStatus::Pending.as_str()))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return match self.find_by_id(id).await? {
                Some(_) => Ok(None),
                None => Err(AppError::NotFound),
            };
        }

        self.find_by_id(id).await
    }

    async fn fulfill(&self, id: Uuid, payment_intent_id: Option<String>) -> AppResult<Fulfillment> {
        transaction_serializable(&self.db, move |txn| {
            Box::pin(async move {
                let header = OrderEntity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or(AppError::NotFound)?;
                let items = items_of(txn, id).await?;

                let outcome = match OrderStatus::from(header.status.as_str()) {
                    OrderStatus::Pending => FulfillmentOutcome::Fulfilled,
                    OrderStatus::Paid => FulfillmentOutcome::AlreadyFulfilled,
                    OrderStatus::Expired | OrderStatus::Failed => FulfillmentOutcome::Ignored,
                };
                if outcome != FulfillmentOutcome::Fulfilled {
                    return Ok(Fulfillment {
                        order: header.into_domain(items),
                        outcome,
                        new_enrollments: Vec::new(),
                    });
                }

                let now = chrono::Utc::now();
                let user_id = header.user_id;
                let mut active: order::ActiveModel = header.into();
                active.status = Set(OrderStatus::Paid.as_str().to_string());
                active.fulfilled_at = Set(Some(now));
                active.updated_at = Set(now);
                if payment_intent_id.is_some() {
                    active.payment_intent_id = Set(payment_intent_id);
                }
                let header = active.update(txn).await?;

                let course_ids: Vec<Uuid> = items.iter().map(|i| i.course_id).collect();
                let existing: Vec<Uuid> = enrollment::Entity::find()
                    .filter(enrollment::Column::UserId.eq(user_id))
                    .filter(enrollment::Column::CourseId.is_in(course_ids.clone()))
                    .all(txn)
                    .await?
                    .into_iter()
                    .map(|e| e.course_id)
                    .collect();

                // Items snapshot their course; a course deleted since checkout grants nothing
                let live: Vec<Uuid> = course::Entity::find()
                    .select_only()
                    .column(course::Column::Id)
                    .filter(course::Column::Id.is_in(course_ids.clone()))
                    .into_tuple()
                    .all(txn)
                    .await?;
                for missing in course_ids.iter().filter(|c| !live.contains(c)) {
                    tracing::warn!(order_id = %id, course_id = %missing, "Paid course no longer exists");
                }

                let mut new_enrollments = Vec::new();
                for course_id in course_ids
                    .iter()
                    .filter(|c| live.contains(c) && !existing.contains(c))
                {
                    let model = enrollment::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        user_id: Set(user_id),
                        course_id: Set(*course_id),
                        order_id: Set(Some(id)),
                        enrolled_at: Set(now),
                    }
                    .insert(txn)
                    .await?;
                    new_enrollments.push(Enrollment::from(model));
                }

                cart_item::Entity::delete_many()
                    .filter(cart_item::Column::UserId.eq(user_id))
                    .filter(cart_item::Column::CourseId.is_in(course_ids))
                    .exec(txn)
                    .await?;

                Ok(Fulfillment {
                    order: header.into_domain(items),
                    outcome,
                    new_enrollments,
                })
            })
        })
        .await
    }

    async fn has_open_orders_for_course(&self, course_id: Uuid) -> AppResult<bool> {
        let order_ids: Vec<Uuid> = OrderItemEntity::find()
            .select_only()
            .column(order_item::Column::OrderId)
            .filter(order_item::Column::CourseId.eq(course_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        if order_ids.is_empty() {
            return Ok(false);
        }

        let open = OrderEntity::find()
            .filter(order::Column::Id.is_in(order_ids))
            .filter(order::Column::Status.is_in([
                OrderStatus::Pending.as_str(),
                OrderStatus::Paid.as_str(),
            ]))
            .count(&self.db)
            .await?;
        Ok(open > 0)
    }
}
