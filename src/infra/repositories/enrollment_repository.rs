//! Enrollments and lesson progress.

use async_trait::async_trait;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::base::conflict_on_unique;
use super::entities::{
    enrollment::{self, Entity as EnrollmentEntity},
    lesson_progress::{self, Entity as ProgressEntity},
};
use crate::domain::{Enrollment, LessonProgress};
use crate::errors::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    async fn find(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Option<Enrollment>>;

    /// Insert an enrollment; an existing (user, course) pair is a `Conflict`.
    async fn create(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        order_id: Option<Uuid>,
    ) -> AppResult<Enrollment>;

    /// Enrollments of a user, newest first
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Enrollment>>;

    async fn list_all(&self) -> AppResult<Vec<Enrollment>>;

    async fn count_by_course(&self, course_id: Uuid) -> AppResult<u64>;

    /// Subset of `course_ids` the user is enrolled in
    async fn enrolled_course_ids(&self, user_id: Uuid, course_ids: Vec<Uuid>) -> AppResult<Vec<Uuid>>;
}

pub struct EnrollmentStore {
    db: DatabaseConnection,
}

impl EnrollmentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EnrollmentRepository for EnrollmentStore {
    async fn find(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Option<Enrollment>> {
        let model = EnrollmentEntity::find()
            .filter(enrollment::Column::UserId.eq(user_id))
            .filter(enrollment::Column::CourseId.eq(course_id))
            .one(&self.db)
            .await?;
        Ok(model.map(Enrollment::from))
    }

    async fn create(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        order_id: Option<Uuid>,
    ) -> AppResult<Enrollment> {
        let model = enrollment::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            course_id: Set(course_id),
            order_id: Set(order_id),
            enrolled_at: Set(chrono::Utc::now()),
        }
        .insert(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "Already enrolled in this course"))?;

        Ok(Enrollment::from(model))
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Enrollment>> {
        let models = EnrollmentEntity::find()
            .filter(enrollment::Column::UserId.eq(user_id))
            .order_by_desc(enrollment::Column::EnrolledAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Enrollment::from).collect())
    }

    async fn list_all(&self) -> AppResult<Vec<Enrollment>> {
        let models = EnrollmentEntity::find().all(&self.db).await?;
        Ok(models.into_iter().map(Enrollment::from).collect())
    }

    async fn count_by_course(&self, course_id: Uuid) -> AppResult<u64> {
        Ok(EnrollmentEntity::find()
            .filter(enrollment::Column::CourseId.eq(course_id))
            .count(&self.db)
            .await?)
    }

    async fn enrolled_course_ids(&self, user_id: Uuid, course_ids: Vec<Uuid>) -> AppResult<Vec<Uuid>> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = EnrollmentEntity::find()
            .select_only()
            .column(enrollment::Column::CourseId)
            .filter(enrollment::Column::UserId.eq(user_id))
            .filter(enrollment::Column::CourseId.is_in(course_ids))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids)
    }
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn find(&self, user_id: Uuid, lesson_id: Uuid) -> AppResult<Option<LessonProgress>>;

    /// Insert or overwrite the (user, lesson) row
    async fn save(&self, progress: LessonProgress) -> AppResult<LessonProgress>;

    async fn list_for_course(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Vec<LessonProgress>>;

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<LessonProgress>>;
}

pub struct ProgressStore {
    db: DatabaseConnection,
}

impl ProgressStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProgressRepository for ProgressStore {
    async fn find(&self, user_id: Uuid, lesson_id: Uuid) -> AppResult<Option<LessonProgress>> {
        let model = ProgressEntity::find_by_id((user_id, lesson_id))
            .one(&self.db)
            .await?;
        Ok(model.map(LessonProgress::from))
    }

    async fn save(&self, progress: LessonProgress) -> AppResult<LessonProgress> {
        let active = lesson_progress::ActiveModel {
            user_id: Set(progress.user_id),
            lesson_id: Set(progress.lesson_id),
            course_id: Set(progress.course_id),
            position_seconds: Set(progress.position_seconds),
            completed: Set(progress.completed),
            updated_at: Set(progress.updated_at),
        };

        ProgressEntity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    lesson_progress::Column::UserId,
                    lesson_progress::Column::LessonId,
                ])
                .update_columns([
                    lesson_progress::Column::PositionSeconds,
                    lesson_progress::Column::Completed,
                    lesson_progress::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(progress)
    }

    async fn list_for_course(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Vec<LessonProgress>> {
        let models = ProgressEntity::find()
            .filter(lesson_progress::Column::UserId.eq(user_id))
            .filter(lesson_progress::Column::CourseId.eq(course_id))
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(LessonProgress::from).collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<LessonProgress>> {
        let models = ProgressEntity::find()
            .filter(lesson_progress::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(LessonProgress::from).collect())
    }
}
