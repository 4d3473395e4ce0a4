//! Course reviews.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Actor, NewReview, Review, ReviewList, ReviewPatch};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{Collection, DualWriter, UnitOfWork};
use crate::types::{Paginated, PaginationParams};

#[async_trait]
pub trait ReviewService: Send + Sync {
    async fn list_reviews(&self, course_id: Uuid, params: PaginationParams)
        -> AppResult<ReviewList>;

    /// One review per enrolled student and course
    async fn create_review(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        input: NewReview,
    ) -> AppResult<Review>;

    async fn update_review(&self, actor: &Actor, id: Uuid, patch: ReviewPatch)
        -> AppResult<Review>;

    async fn delete_review(&self, actor: &Actor, id: Uuid) -> AppResult<()>;
}

pub struct ReviewManager<U: UnitOfWork> {
    uow: Arc<U>,
    writer: DualWriter,
}

impl<U: UnitOfWork> ReviewManager<U> {
    pub fn new(uow: Arc<U>, writer: DualWriter) -> Self {
        Self { uow, writer }
    }

    /// Authors and admins may change a review
    async fn load_for(&self, actor: &Actor, id: Uuid) -> AppResult<Review> {
        let review = self.uow.reviews().find_by_id(id).await?.ok_or_not_found()?;
        if review.user_id != actor.id && !actor.role.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(review)
    }
}

fn clean_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

#[async_trait]
impl<U: UnitOfWork> ReviewService for ReviewManager<U> {
    async fn list_reviews(
        &self,
        course_id: Uuid,
        params: PaginationParams,
    ) -> AppResult<ReviewList> {
        self.uow
            .courses()
            .find_by_id(course_id)
            .await?
            .filter(|c| c.is_published())
            .ok_or_not_found()?;

        let (reviews, total) = self
            .uow
            .reviews()
            .list_by_course(course_id, params)
            .await?;
        let summary = self.uow.reviews().summary(course_id).await?;
        let page = Paginated::new(reviews, &params, total);

        Ok(ReviewList {
            summary,
            reviews: page.data,
            meta: page.meta,
        })
    }

    async fn create_review(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        input: NewReview,
    ) -> AppResult<Review> {
        if self
            .uow
            .enrollments()
            .find(user_id, course_id)
            .await?
            .is_none()
        {
            return Err(AppError::Forbidden);
        }
        if self
            .uow
            .reviews()
            .find_by_author(user_id, course_id)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("You have already reviewed this course"));
        }

        let author = self
            .uow
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or_not_found()?;

        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            course_id,
            user_id,
            author_name: author.name,
            rating: input.rating,
            comment: clean_comment(input.comment),
            created_at: now,
            updated_at: now,
        };

        let review = self.uow.reviews().insert(review).await?;
        self.writer
            .mirror(Collection::Reviews, review.id, &review)
            .await;

        tracing::info!(review_id = %review.id, course_id = %course_id, rating = review.rating, "Review created");
        Ok(review)
    }

    async fn update_review(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: ReviewPatch,
    ) -> AppResult<Review> {
        let mut review = self.load_for(actor, id).await?;

        if let Some(rating) = patch.rating {
            review.rating = rating;
        }
        if patch.comment.is_some() {
            review.comment = clean_comment(patch.comment);
        }
        review.updated_at = Utc::now();

        let review = self.uow.reviews().update(review).await?;
        self.writer
            .mirror(Collection::Reviews, review.id, &review)
            .await;
        Ok(review)
    }

    async fn delete_review(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        self.load_for(actor, id).await?;
        self.uow.reviews().delete(id).await?;
        self.writer.remove(Collection::Reviews, id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourseStatus, Enrollment, RatingSummary, UserRole};
    use crate::infra::InMemoryDocumentStore;
    use crate::services::test_support::{actor, course, memory_writer, user, Mocks, TestUnitOfWork};

    fn service(mocks: Mocks) -> (ReviewManager<TestUnitOfWork>, Arc<InMemoryDocumentStore>) {
        let (writer, store) = memory_writer();
        (ReviewManager::new(mocks.into_uow(), writer), store)
    }

    fn review(user_id: Uuid, course_id: Uuid, rating: i16) -> Review {
        let now = Utc::now();
        Review {
            id: Uuid::new_v4(),
            course_id,
            user_id,
            author_name: "Ada Lovelace".into(),
            rating,
            comment: Some("Clear and practical".into()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_only_enrolled_students_review() {
        let mut mocks = Mocks::default();
        mocks.enrollments.expect_find().returning(|_, _| Ok(None));
        mocks.reviews.expect_insert().never();

        let (service, _) = service(mocks);
        let result = service
            .create_review(
                Uuid::new_v4(),
                Uuid::new_v4(),
                NewReview {
                    rating: 5,
                    comment: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_create_review_uses_author_name() {
        let student = user(UserRole::Student);
        let student_id = student.id;
        let course_id = Uuid::new_v4();

        let mut mocks = Mocks::default();
        mocks.enrollments.expect_find().returning(|u, c| {
            Ok(Some(Enrollment {
                id: Uuid::new_v4(),
                user_id: u,
                course_id: c,
                order_id: None,
                enrolled_at: Utc::now(),
            }))
        });
        mocks.reviews.expect_find_by_author().returning(|_, _| Ok(None));
        mocks
            .users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(student.clone())));
        mocks.reviews.expect_insert().returning(Ok);

        let (service, store) = service(mocks);
        let created = service
            .create_review(
                student_id,
                course_id,
                NewReview {
                    rating: 4,
                    comment: Some("  ".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(created.author_name, "Ada Lovelace");
        assert_eq!(created.comment, None);
        assert_eq!(store.len(Collection::Reviews).await, 1);
    }

    #[tokio::test]
    async fn test_second_review_conflicts() {
        let mut mocks = Mocks::default();
        mocks.enrollments.expect_find().returning(|u, c| {
            Ok(Some(Enrollment {
                id: Uuid::new_v4(),
                user_id: u,
                course_id: c,
                order_id: None,
                enrolled_at: Utc::now(),
            }))
        });
        mocks
            .reviews
            .expect_find_by_author()
            .returning(|u, c| Ok(Some(review(u, c, 5))));

        let (service, _) = service(mocks);
        let result = service
            .create_review(
                Uuid::new_v4(),
                Uuid::new_v4(),
                NewReview {
                    rating: 3,
                    comment: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_strangers_cannot_edit_reviews() {
        let stranger = user(UserRole::Student);
        let existing = review(Uuid::new_v4(), Uuid::new_v4(), 2);
        let id = existing.id;

        let mut mocks = Mocks::default();
        mocks
            .reviews
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));

        let (service, _) = service(mocks);
        let result = service
            .update_review(&actor(&stranger), id, ReviewPatch::default())
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_admin_can_delete_any_review() {
        let admin = user(UserRole::Admin);
        let existing = review(Uuid::new_v4(), Uuid::new_v4(), 1);
        let id = existing.id;

        let (writer, store) = memory_writer();
        writer.mirror(Collection::Reviews, id, &existing).await;

        let mut mocks = Mocks::default();
        mocks
            .reviews
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        mocks.reviews.expect_delete().returning(|_| Ok(()));

        let service = ReviewManager::new(mocks.into_uow(), writer);
        service.delete_review(&actor(&admin), id).await.unwrap();
        assert_eq!(store.len(Collection::Reviews).await, 0);
    }

    #[tokio::test]
    async fn test_list_reviews_includes_summary_and_meta() {
        let c = course(Uuid::new_v4(), CourseStatus::Published, 1000);
        let course_id = c.id;

        let mut mocks = Mocks::default();
        mocks
            .courses
            .expect_find_by_id()
            .returning(move |_| Ok(Some(c.clone())));
        mocks.reviews.expect_list_by_course().returning(|course_id, _| {
            Ok((vec![review(Uuid::new_v4(), course_id, 5)], 11))
        });
        mocks.reviews.expect_summary().returning(|_| {
            Ok(RatingSummary {
                average: 4.2,
                count: 11,
            })
        });

        let (service, _) = service(mocks);
        let list = service
            .list_reviews(course_id, PaginationParams::new(2, 10))
            .await
            .unwrap();

        assert_eq!(list.reviews.len(), 1);
        assert_eq!(list.summary.count, 11);
        assert_eq!(list.meta.page, 2);
        assert_eq!(list.meta.total_pages, 2);
    }
}
