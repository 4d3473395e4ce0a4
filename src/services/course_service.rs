//! Course service - Catalog browsing and the instructor authoring lifecycle.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::container::parallel;
use crate::domain::slug::{slugify, unique_slug};
use crate::domain::{
    Actor, Course, CourseDetail, CourseFilter, CoursePatch, CourseStatus, InstructorProfile,
    NewCourse,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::repositories::CatalogQuery;
use crate::infra::{Collection, DualWriter, UnitOfWork};
use crate::types::{Paginated, PaginationParams};

#[async_trait]
pub trait CourseService: Send + Sync {
    /// Public catalog, newest first
    async fn list_published(
        &self,
        filter: CourseFilter,
        params: PaginationParams,
    ) -> AppResult<Paginated<Course>>;

    /// Landing page of a published course
    async fn get_published_by_slug(&self, slug: &str) -> AppResult<CourseDetail>;

    /// Every course the caller authored, any status
    async fn list_for_instructor(&self, actor: &Actor) -> AppResult<Vec<Course>>;

    async fn create_course(&self, actor: &Actor, input: NewCourse) -> AppResult<Course>;

    async fn update_course(&self, actor: &Actor, id: Uuid, patch: CoursePatch)
        -> AppResult<Course>;

    async fn publish(&self, actor: &Actor, id: Uuid) -> AppResult<Course>;

    async fn unpublish(&self, actor: &Actor, id: Uuid) -> AppResult<Course>;

    async fn archive(&self, actor: &Actor, id: Uuid) -> AppResult<Course>;

    /// Remove a course nobody is enrolled in
    async fn delete_course(&self, actor: &Actor, id: Uuid) -> AppResult<()>;
}

pub struct CourseManager<U: UnitOfWork> {
    uow: Arc<U>,
    writer: DualWriter,
    currency: String,
}

impl<U: UnitOfWork> CourseManager<U> {
    pub fn new(uow: Arc<U>, writer: DualWriter, currency: String) -> Self {
        Self {
            uow,
            writer,
            currency,
        }
    }

    async fn load(&self, id: Uuid) -> AppResult<Course> {
        self.uow.courses().find_by_id(id).await?.ok_or_not_found()
    }

    /// Load a course the actor may edit
    async fn load_editable(&self, actor: &Actor, id: Uuid) -> AppResult<Course> {
        let course = self.load(id).await?;
        course.ensure_editable_by(actor)?;
        Ok(course)
    }

    async fn free_slug(&self, title: &str, current: Option<&str>) -> AppResult<String> {
        let base = slugify(title);
        let taken: HashSet<String> = self
            .uow
            .courses()
            .slugs_like(&base)
            .await?
            .into_iter()
            .filter(|s| Some(s.as_str()) != current)
            .collect();
        Ok(unique_slug(&base, &taken))
    }

    async fn ensure_category_exists(&self, category_id: Option<Uuid>) -> AppResult<()> {
        if let Some(id) = category_id {
            if self.uow.categories().find_by_id(id).await?.is_none() {
                return Err(AppError::bad_request("Unknown category"));
            }
        }
        Ok(())
    }

    async fn save(&self, course: Course) -> AppResult<Course> {
        let course = self.uow.courses().update(course).await?;
        self.writer
            .mirror(Collection::Courses, course.id, &course)
            .await;
        Ok(course)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl<U: UnitOfWork> CourseService for CourseManager<U> {
    async fn list_published(
        &self,
        filter: CourseFilter,
        params: PaginationParams,
    ) -> AppResult<Paginated<Course>> {
        let category_id = match filter.category.as_deref() {
            Some(slug) => match self.uow.categories().find_by_slug(slug).await? {
                Some(category) => Some(category.id),
                // Unknown category: nothing can match
                None => return Ok(Paginated::new(Vec::new(), &params, 0)),
            },
            None => None,
        };

        let query = CatalogQuery {
            category_id,
            instructor_id: filter.instructor_id,
            title: filter.q,
        };

        let (courses, total) = self.uow.courses().list_published(query, params).await?;
        Ok(Paginated::new(courses, &params, total))
    }

    async fn get_published_by_slug(&self, slug: &str) -> AppResult<CourseDetail> {
        let course = self
            .uow
            .courses()
            .find_by_slug(slug)
            .await?
            .filter(|c| c.is_published())
            .ok_or_not_found()?;

        let (users, lessons, reviews) = (self.uow.users(), self.uow.lessons(), self.uow.reviews());
        let (instructor, lessons, rating) = parallel::join3(
            users.find_by_id(course.instructor_id),
            lessons.list_by_course(course.id),
            reviews.summary(course.id),
        )
        .await?;
        let instructor = instructor.ok_or_not_found()?;

        let category = match course.category_id {
            Some(id) => self.uow.categories().find_by_id(id).await?,
            None => None,
        };

        Ok(CourseDetail {
            instructor: InstructorProfile::from(&instructor),
            category,
            lesson_count: lessons.len() as u32,
            total_duration_seconds: lessons
                .iter()
                .fold(0i64, |total, l| total.saturating_add(l.duration_seconds)),
            lessons: lessons.iter().map(|l| l.outline()).collect(),
            rating,
            course,
        })
    }

    async fn list_for_instructor(&self, actor: &Actor) -> AppResult<Vec<Course>> {
        self.uow.courses().list_by_instructor(actor.id).await
    }

    async fn create_course(&self, actor: &Actor, input: NewCourse) -> AppResult<Course> {
        if !actor.role.can_author() {
            return Err(AppError::Forbidden);
        }
        self.ensure_category_exists(input.category_id).await?;

        let title = input.title.trim().to_string();
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            instructor_id: actor.id,
            category_id: input.category_id,
            slug: self.free_slug(&title, None).await?,
            title,
            subtitle: input.subtitle.and_then(non_blank),
            description: input.description.and_then(non_blank),
            price_cents: input.price_cents,
            currency: self.currency.clone(),
            thumbnail_url: input.thumbnail_url,
            status: CourseStatus::Draft,
            created_at: now,
            updated_at: now,
            published_at: None,
        };

        let course = self.uow.courses().insert(course).await?;
        self.writer
            .mirror(Collection::Courses, course.id, &course)
            .await;

        tracing::info!(course_id = %course.id, instructor_id = %actor.id, "Course created");
        Ok(course)
    }

    async fn update_course(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: CoursePatch,
    ) -> AppResult<Course> {
        let mut course = self.load_editable(actor, id).await?;

        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            // Published URLs stay stable
            if title != course.title && course.status == CourseStatus::Draft {
                course.slug = self.free_slug(&title, Some(&course.slug)).await?;
            }
            course.title = title;
        }
        if let Some(subtitle) = patch.subtitle {
            course.subtitle = non_blank(subtitle);
        }
        if let Some(description) = patch.description {
            course.description = non_blank(description);
        }
        if let Some(price_cents) = patch.price_cents {
            course.price_cents = price_cents;
        }
        if patch.category_id.is_some() {
            self.ensure_category_exists(patch.category_id).await?;
            course.category_id = patch.category_id;
        }
        if let Some(url) = patch.thumbnail_url {
            course.thumbnail_url = non_blank(url);
        }
        course.updated_at = Utc::now();

        self.save(course).await
    }

    async fn publish(&self, actor: &Actor, id: Uuid) -> AppResult<Course> {
        let mut course = self.load_editable(actor, id).await?;
        let lesson_count = self.uow.lessons().count_by_course(id).await?;
        course.publish(lesson_count)?;

        let course = self.save(course).await?;
        tracing::info!(course_id = %id, "Course published");
        Ok(course)
    }

    async fn unpublish(&self, actor: &Actor, id: Uuid) -> AppResult<Course> {
        let mut course = self.load_editable(actor, id).await?;
        course.unpublish()?;
        self.save(course).await
    }

    async fn archive(&self, actor: &Actor, id: Uuid) -> AppResult<Course> {
        let mut course = self.load_editable(actor, id).await?;
        course.archive()?;
        self.save(course).await
    }

    async fn delete_course(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        self.load_editable(actor, id).await?;

        if self.uow.enrollments().count_by_course(id).await? > 0 {
            return Err(AppError::conflict(
                "Students are enrolled in this course; archive it instead",
            ));
        }
        if self.uow.orders().has_open_orders_for_course(id).await? {
            return Err(AppError::conflict(
                "This course has orders awaiting payment; archive it instead",
            ));
        }

        let removal = self.uow.courses().delete(id).await?;
        self.writer.remove(Collection::Courses, id).await;
        self.writer
            .remove_all(Collection::Lessons, &removal.lesson_ids)
            .await;
        self.writer
            .remove_all(Collection::Reviews, &removal.review_ids)
            .await;

        tracing::info!(
            course_id = %id,
            lessons = removal.lesson_ids.len(),
            reviews = removal.review_ids.len(),
            "Course deleted"
        );
        Ok(())
    }
}
