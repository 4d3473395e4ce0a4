use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::base::conflict_on_unique;
use super::entities::{
    lesson::{self, ActiveModel, Entity as LessonEntity},
    lesson_progress,
};
use crate::domain::Lesson;
use crate::errors::{AppError, AppResult};
use crate::infra::unit_of_work::transaction;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait LessonRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Lesson>>;

    /// Lessons of a course ordered by position
    async fn list_by_course(&self, course_id: Uuid) -> AppResult<Vec<Lesson>>;

    async fn count_by_course(&self, course_id: Uuid) -> AppResult<u64>;

    /// Lesson counts for many courses in one grouped query; courses without
    /// lessons are absent from the map.
    async fn counts_by_course(&self, course_ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, u64>>;

    async fn list_all(&self) -> AppResult<Vec<Lesson>>;

    async fn insert(&self, lesson: Lesson) -> AppResult<Lesson>;

    async fn update(&self, lesson: Lesson) -> AppResult<Lesson>;

    /// Delete a lesson and close the gap in positions.
    /// Returns the remaining lessons of the course.
    async fn delete(&self, id: Uuid) -> AppResult<Vec<Lesson>>;

    /// Assign positions 1..=n in the order of `lesson_ids`.
    async fn reorder(&self, course_id: Uuid, lesson_ids: Vec<Uuid>) -> AppResult<Vec<Lesson>>;
}

pub struct LessonStore {
    db: DatabaseConnection,
}

impl LessonStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

async fn lessons_of(txn: &DatabaseTransaction, course_id: Uuid) -> AppResult<Vec<lesson::Model>> {
    Ok(LessonEntity::find()
        .filter(lesson::Column::CourseId.eq(course_id))
        .order_by_asc(lesson::Column::Position)
        .all(txn)
        .await?)
}

/// Write positions 1..=n following `ordered`, touching only rows that move.
async fn assign_positions(
    txn: &DatabaseTransaction,
    ordered: Vec<lesson::Model>,
) -> AppResult<Vec<Lesson>> {
    let now = chrono::Utc::now();
    let mut out = Vec::with_capacity(ordered.len());

    for (index, model) in ordered.into_iter().enumerate() {
        let position = index as i32 + 1;
        if model.position == position {
            out.push(Lesson::from(model));
            continue;
        }
        let mut active: ActiveModel = model.into();
        active.position = Set(position);
        active.updated_at = Set(now);
        out.push(Lesson::from(active.update(txn).await?));
    }

    Ok(out)
}

#[async_trait]
impl LessonRepository for LessonStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Lesson>> {
        let model = LessonEntity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Lesson::from))
    }

    async fn list_by_course(&self, course_id: Uuid) -> AppResult<Vec<Lesson>> {
        let models = LessonEntity::find()
            .filter(lesson::Column::CourseId.eq(course_id))
            .order_by_asc(lesson::Column::Position)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Lesson::from).collect())
    }

    async fn count_by_course(&self, course_id: Uuid) -> AppResult<u64> {
        Ok(LessonEntity::find()
            .filter(lesson::Column::CourseId.eq(course_id))
            .count(&self.db)
            .await?)
    }

    async fn counts_by_course(&self, course_ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, u64>> {
        if course_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, i64)> = LessonEntity::find()
            .select_only()
            .column(lesson::Column::CourseId)
            .column_as(Expr::col(lesson::Column::Id).count(), "lesson_count")
            .filter(lesson::Column::CourseId.is_in(course_ids))
            .group_by(lesson::Column::CourseId)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(course_id, count)| (course_id, count.max(0) as u64))
            .collect())
    }

    async fn list_all(&self) -> AppResult<Vec<Lesson>> {
        let models = LessonEntity::find().all(&self.db).await?;
        Ok(models.into_iter().map(Lesson::from).collect())
    }

    async fn insert(&self, lesson: Lesson) -> AppResult<Lesson> {
        let model = ActiveModel {
            id: Set(lesson.id),
            course_id: Set(lesson.course_id),
            title: Set(lesson.title),
            slug: Set(lesson.slug),
            description: Set(lesson.description),
            video_url: Set(lesson.video_url),
            duration_seconds: Set(lesson.duration_seconds),
            position: Set(lesson.position),
            is_preview: Set(lesson.is_preview),
            created_at: Set(lesson.created_at),
            updated_at: Set(lesson.updated_at),
        }
        .insert(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "A lesson with this slug already exists in the course"))?;

        Ok(Lesson::from(model))
    }

    async fn update(&self, lesson: Lesson) -> AppResult<Lesson> {
        let existing = LessonEntity::find_by_id(lesson.id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        active.title = Set(lesson.title);
        active.slug = Set(lesson.slug);
        active.description = Set(lesson.description);
        active.video_url = Set(lesson.video_url);
        active.duration_seconds = Set(lesson.duration_seconds);
        active.is_preview = Set(lesson.is_preview);
        active.updated_at = Set(chrono::Utc::now());

        let model = active
            .update(&self.db)
            .await
            .map_err(|e| conflict_on_unique(e, "A lesson with this slug already exists in the course"))?;
        Ok(Lesson::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<Vec<Lesson>> {
        transaction(&self.db, move |txn| {
            Box::pin(async move {
                let target = LessonEntity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or(AppError::NotFound)?;

                lesson_progress::Entity::delete_many()
                    .filter(lesson_progress::Column::LessonId.eq(id))
                    .exec(txn)
                    .await?;
                LessonEntity::delete_by_id(id).exec(txn).await?;

                let remaining = lessons_of(txn, target.course_id).await?;
                assign_positions(txn, remaining).await
            })
        })
        .await
    }

    async fn reorder(&self, course_id: Uuid, lesson_ids: Vec<Uuid>) -> AppResult<Vec<Lesson>> {
        transaction(&self.db, move |txn| {
            Box::pin(async move {
                let mut current = lessons_of(txn, course_id).await?;

                let mut ordered = Vec::with_capacity(lesson_ids.len());
                for id in &lesson_ids {
                    let index = current
                        .iter()
                        .position(|l| l.id == *id)
                        .ok_or_else(|| AppError::validation("Unknown lesson in new order"))?;
                    ordered.push(current.swap_remove(index));
                }
                if !current.is_empty() {
                    return Err(AppError::validation(
                        "Lesson ids must list every lesson of the course exactly once",
                    ));
                }

                assign_positions(txn, ordered).await
            })
        })
        .await
    }
}
