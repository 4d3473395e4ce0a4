//! Shopping cart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{CartLine, CartView};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;

#[async_trait]
pub trait CartService: Send + Sync {
    async fn get_cart(&self, user_id: Uuid) -> AppResult<CartView>;

    /// Add a paid course; adding it twice leaves the cart unchanged
    async fn add_item(&self, user_id: Uuid, course_id: Uuid) -> AppResult<CartView>;

    async fn remove_item(&self, user_id: Uuid, course_id: Uuid) -> AppResult<CartView>;

    async fn clear(&self, user_id: Uuid) -> AppResult<()>;
}

pub struct CartManager<U: UnitOfWork> {
    uow: Arc<U>,
    currency: String,
}

impl<U: UnitOfWork> CartManager<U> {
    pub fn new(uow: Arc<U>, currency: String) -> Self {
        Self { uow, currency }
    }
}

#[async_trait]
impl<U: UnitOfWork> CartService for CartManager<U> {
    async fn get_cart(&self, user_id: Uuid) -> AppResult<CartView> {
        let items = self.uow.carts().list(user_id).await?;
        if items.is_empty() {
            return Ok(CartView::new(Vec::new(), &self.currency));
        }

        let mut courses: HashMap<Uuid, _> = self
            .uow
            .courses()
            .find_many(items.iter().map(|i| i.course_id).collect())
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        // Courses unpublished since they were added drop out of the view
        let lines = items
            .into_iter()
            .filter_map(|item| {
                courses
                    .remove(&item.course_id)
                    .filter(|c| c.is_published())
                    .map(|course| CartLine {
                        course,
                        added_at: item.added_at,
                    })
            })
            .collect();

        Ok(CartView::new(lines, &self.currency))
    }

    async fn add_item(&self, user_id: Uuid, course_id: Uuid) -> AppResult<CartView> {
        let course = self
            .uow
            .courses()
            .find_by_id(course_id)
            .await?
            .ok_or_not_found()?;
        course.ensure_purchasable_by(user_id)?;

        if course.is_free() {
            return Err(AppError::bad_request(
                "Free courses are enrolled in directly, not bought",
            ));
        }
        if self
            .uow
            .enrollments()
            .find(user_id, course_id)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("You already own this course"));
        }

        if self.uow.carts().add(user_id, course_id).await? {
            tracing::debug!(user_id = %user_id, course_id = %course_id, "Added to cart");
        }
        self.get_cart(user_id).await
    }

    async fn remove_item(&self, user_id: Uuid, course_id: Uuid) -> AppResult<CartView> {
        self.uow.carts().remove(user_id, course_id).await?;
        self.get_cart(user_id).await
    }

    async fn clear(&self, user_id: Uuid) -> AppResult<()> {
        self.uow.carts().clear(user_id).await?;
        Ok(())
    }
}
