//! Lesson authoring and gated lesson access.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::lesson::ensure_permutation;
use crate::domain::slug::{slugify, unique_slug};
use crate::domain::{Actor, Course, Lesson, LessonPatch, NewLesson};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{Collection, DualWriter, UnitOfWork};

#[async_trait]
pub trait LessonService: Send + Sync {
    /// Append a lesson at the end of the course
    async fn create_lesson(
        &self,
        actor: &Actor,
        course_id: Uuid,
        input: NewLesson,
    ) -> AppResult<Lesson>;

    async fn update_lesson(&self, actor: &Actor, id: Uuid, patch: LessonPatch)
        -> AppResult<Lesson>;

    async fn delete_lesson(&self, actor: &Actor, id: Uuid) -> AppResult<()>;

    async fn reorder_lessons(
        &self,
        actor: &Actor,
        course_id: Uuid,
        lesson_ids: Vec<Uuid>,
    ) -> AppResult<Vec<Lesson>>;

    /// Fetch a lesson for playback. Anonymous viewers only get previews.
    async fn get_lesson(&self, viewer: Option<Actor>, id: Uuid) -> AppResult<Lesson>;
}

pub struct LessonManager<U: UnitOfWork> {
    uow: Arc<U>,
    writer: DualWriter,
}

impl<U: UnitOfWork> LessonManager<U> {
    pub fn new(uow: Arc<U>, writer: DualWriter) -> Self {
        Self { uow, writer }
    }

    async fn editable_course(&self, actor: &Actor, course_id: Uuid) -> AppResult<Course> {
        let course = self
            .uow
            .courses()
            .find_by_id(course_id)
            .await?
            .ok_or_not_found()?;
        course.ensure_editable_by(actor)?;
        Ok(course)
    }

    /// Load a lesson together with its course, checking edit rights
    async fn editable_lesson(&self, actor: &Actor, id: Uuid) -> AppResult<(Lesson, Course)> {
        let lesson = self.uow.lessons().find_by_id(id).await?.ok_or_not_found()?;
        let course = self.editable_course(actor, lesson.course_id).await?;
        Ok((lesson, course))
    }

    async fn mirror_all(&self, lessons: &[Lesson]) {
        for lesson in lessons {
            self.writer
                .mirror(Collection::Lessons, lesson.id, lesson)
                .await;
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<U: UnitOfWork> LessonService for LessonManager<U> {
    async fn create_lesson(
        &self,
        actor: &Actor,
        course_id: Uuid,
        input: NewLesson,
    ) -> AppResult<Lesson> {
        self.editable_course(actor, course_id).await?;

        let siblings = self.uow.lessons().list_by_course(course_id).await?;
        let taken: HashSet<String> = siblings.iter().map(|l| l.slug.clone()).collect();
        let position = siblings.iter().map(|l| l.position).max().unwrap_or(0) + 1;

        let title = input.title.trim().to_string();
        let now = Utc::now();
        let lesson = Lesson {
            id: Uuid::new_v4(),
            course_id,
            slug: unique_slug(&slugify(&title), &taken),
            title,
            description: non_blank(input.description),
            video_url: non_blank(input.video_url),
            duration_seconds: input.duration_seconds.max(0),
            position,
            is_preview: input.is_preview,
            created_at: now,
            updated_at: now,
        };

        let lesson = self.uow.lessons().insert(lesson).await?;
        self.writer
            .mirror(Collection::Lessons, lesson.id, &lesson)
            .await;

        tracing::debug!(lesson_id = %lesson.id, course_id = %course_id, position, "Lesson created");
        Ok(lesson)
    }

    async fn update_lesson(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: LessonPatch,
    ) -> AppResult<Lesson> {
        let (mut lesson, _) = self.editable_lesson(actor, id).await?;

        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title != lesson.title {
                let taken: HashSet<String> = self
                    .uow
                    .lessons()
                    .list_by_course(lesson.course_id)
                    .await?
                    .into_iter()
                    .filter(|l| l.id != lesson.id)
                    .map(|l| l.slug)
                    .collect();
                lesson.slug = unique_slug(&slugify(&title), &taken);
                lesson.title = title;
            }
        }
        if patch.description.is_some() {
            lesson.description = non_blank(patch.description);
        }
        if patch.video_url.is_some() {
            lesson.video_url = non_blank(patch.video_url);
        }
        if let Some(duration) = patch.duration_seconds {
            lesson.duration_seconds = duration.max(0);
        }
        if let Some(is_preview) = patch.is_preview {
            lesson.is_preview = is_preview;
        }

        let lesson = self.uow.lessons().update(lesson).await?;
        self.writer
            .mirror(Collection::Lessons, lesson.id, &lesson)
            .await;
        Ok(lesson)
    }

    async fn delete_lesson(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        let (lesson, course) = self.editable_lesson(actor, id).await?;

        if course.is_published() && self.uow.lessons().count_by_course(course.id).await? <= 1 {
            return Err(AppError::conflict(
                "A published course must keep at least one lesson",
            ));
        }

        let remaining = self.uow.lessons().delete(lesson.id).await?;
        self.writer.remove(Collection::Lessons, lesson.id).await;
        // Positions shifted
        self.mirror_all(&remaining).await;

        tracing::debug!(lesson_id = %id, course_id = %course.id, "Lesson deleted");
        Ok(())
    }

    async fn reorder_lessons(
        &self,
        actor: &Actor,
        course_id: Uuid,
        lesson_ids: Vec<Uuid>,
    ) -> AppResult<Vec<Lesson>> {
        self.editable_course(actor, course_id).await?;

        let existing: Vec<Uuid> = self
            .uow
            .lessons()
            .list_by_course(course_id)
            .await?
            .iter()
            .map(|l| l.id)
            .collect();
        ensure_permutation(&existing, &lesson_ids)?;

        let lessons = self.uow.lessons().reorder(course_id, lesson_ids).await?;
        self.mirror_all(&lessons).await;
        Ok(lessons)
    }

    async fn get_lesson(&self, viewer: Option<Actor>, id: Uuid) -> AppResult<Lesson> {
        let lesson = self.uow.lessons().find_by_id(id).await?.ok_or_not_found()?;
        let course = self
            .uow
            .courses()
            .find_by_id(lesson.course_id)
            .await?
            .ok_or_not_found()?;

        if let Some(viewer) = &viewer {
            if course.ensure_editable_by(viewer).is_ok() {
                return Ok(lesson);
            }
            // Enrolled students keep access after the course is unpublished or archived
            let enrolled = self
                .uow
                .enrollments()
                .find(viewer.id, course.id)
                .await?
                .is_some();
            if enrolled {
                return Ok(lesson);
            }
        }

        if !course.is_published() {
            return Err(AppError::Forbidden);
        }
        if lesson.is_preview {
            return Ok(lesson);
        }

        match viewer {
            Some(_) => Err(AppError::payment_required(
                "Enroll in this course to watch the lesson",
            )),
            None => Err(AppError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourseStatus, Enrollment, UserRole};
    use crate::infra::InMemoryDocumentStore;
    use crate::services::test_support::{
        actor, course, lesson, memory_writer, user, Mocks, TestUnitOfWork,
    };

    fn service(mocks: Mocks) -> (LessonManager<TestUnitOfWork>, Arc<InMemoryDocumentStore>) {
        let (writer, store) = memory_writer();
        (LessonManager::new(mocks.into_uow(), writer), store)
    }

    fn with_course(mocks: &mut Mocks, course: Course) {
        mocks
            .courses
            .expect_find_by_id()
            .returning(move |_| Ok(Some(course.clone())));
    }

    fn with_lesson(mocks: &mut Mocks, lesson: Lesson) {
        mocks
            .lessons
            .expect_find_by_id()
            .returning(move |_| Ok(Some(lesson.clone())));
    }

    #[tokio::test]
    async fn test_create_appends_with_unique_slug() {
        let owner = user(UserRole::Instructor);
        let c = course(owner.id, CourseStatus::Draft, 1000);
        let course_id = c.id;
        let mut existing = lesson(course_id, 1);
        existing.slug = "introduction".into();

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);
        mocks
            .lessons
            .expect_list_by_course()
            .returning(move |_| Ok(vec![existing.clone(), lesson(course_id, 2)]));
        mocks.lessons.expect_insert().returning(Ok);

        let (service, store) = service(mocks);
        let created = service
            .create_lesson(
                &actor(&owner),
                course_id,
                NewLesson {
                    title: "Introduction".into(),
                    description: None,
                    video_url: Some("https://videos.example.com/intro.mp4".into()),
                    duration_seconds: 120,
                    is_preview: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(created.position, 3);
        assert_eq!(created.slug, "introduction-2");
        assert_eq!(store.len(Collection::Lessons).await, 1);
    }

    #[tokio::test]
    async fn test_student_cannot_create_lessons() {
        let student = user(UserRole::Student);
        let c = course(Uuid::new_v4(), CourseStatus::Draft, 1000);
        let course_id = c.id;

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);

        let (service, _) = service(mocks);
        let result = service
            .create_lesson(
                &actor(&student),
                course_id,
                NewLesson {
                    title: "Sneaky".into(),
                    description: None,
                    video_url: None,
                    duration_seconds: 0,
                    is_preview: false,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_published_course_keeps_its_last_lesson() {
        let owner = user(UserRole::Instructor);
        let c = course(owner.id, CourseStatus::Published, 1000);
        let only = lesson(c.id, 1);
        let id = only.id;

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);
        with_lesson(&mut mocks, only);
        mocks.lessons.expect_count_by_course().returning(|_| Ok(1));
        mocks.lessons.expect_delete().never();

        let (service, _) = service(mocks);
        let result = service.delete_lesson(&actor(&owner), id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_remirrors_remaining_positions() {
        let owner = user(UserRole::Instructor);
        let c = course(owner.id, CourseStatus::Draft, 1000);
        let course_id = c.id;
        let first = lesson(course_id, 1);
        let id = first.id;
        let mut second = lesson(course_id, 2);
        second.position = 1;

        let (writer, store) = memory_writer();
        writer.mirror(Collection::Lessons, id, &first).await;

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);
        with_lesson(&mut mocks, first);
        mocks
            .lessons
            .expect_delete()
            .returning(move |_| Ok(vec![second.clone()]));

        let service = LessonManager::new(mocks.into_uow(), writer);
        service.delete_lesson(&actor(&owner), id).await.unwrap();

        let mirrored: Vec<Lesson> = crate::infra::load_collection(store.as_ref(), Collection::Lessons)
            .await
            .unwrap();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].position, 1);
    }

    #[tokio::test]
    async fn test_reorder_requires_permutation() {
        let owner = user(UserRole::Instructor);
        let c = course(owner.id, CourseStatus::Draft, 1000);
        let course_id = c.id;
        let a = lesson(course_id, 1);
        let b = lesson(course_id, 2);
        let a_id = a.id;

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);
        mocks
            .lessons
            .expect_list_by_course()
            .returning(move |_| Ok(vec![a.clone(), b.clone()]));
        mocks.lessons.expect_reorder().never();

        let (service, _) = service(mocks);
        let result = service
            .reorder_lessons(&actor(&owner), course_id, vec![a_id])
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_preview_lesson_is_public() {
        let c = course(Uuid::new_v4(), CourseStatus::Published, 1000);
        let mut preview = lesson(c.id, 1);
        preview.is_preview = true;
        let id = preview.id;

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);
        with_lesson(&mut mocks, preview);

        let (service, _) = service(mocks);
        let fetched = service.get_lesson(None, id).await.unwrap();
        assert!(fetched.video_url.is_some());
    }

    #[tokio::test]
    async fn test_locked_lesson_requires_enrollment() {
        let student = user(UserRole::Student);
        let c = course(Uuid::new_v4(), CourseStatus::Published, 1000);
        let locked = lesson(c.id, 2);
        let id = locked.id;

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);
        with_lesson(&mut mocks, locked);
        mocks.enrollments.expect_find().returning(|_, _| Ok(None));

        let (service, _) = service(mocks);
        let result = service.get_lesson(Some(actor(&student)), id).await;
        assert!(matches!(result, Err(AppError::PaymentRequired(_))));
    }

    #[tokio::test]
    async fn test_enrolled_student_can_watch() {
        let student = user(UserRole::Student);
        let student_id = student.id;
        let c = course(Uuid::new_v4(), CourseStatus::Published, 1000);
        let course_id = c.id;
        let locked = lesson(course_id, 2);
        let id = locked.id;

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);
        with_lesson(&mut mocks, locked);
        mocks.enrollments.expect_find().returning(move |_, _| {
            Ok(Some(Enrollment {
                id: Uuid::new_v4(),
                user_id: student_id,
                course_id,
                order_id: None,
                enrolled_at: Utc::now(),
            }))
        });

        let (service, _) = service(mocks);
        let fetched = service.get_lesson(Some(actor(&student)), id).await.unwrap();
        assert!(fetched.video_url.is_some());
    }

    #[tokio::test]
    async fn test_draft_lessons_are_hidden_from_students() {
        let student = user(UserRole::Student);
        let c = course(Uuid::new_v4(), CourseStatus::Draft, 1000);
        let mut preview = lesson(c.id, 1);
        preview.is_preview = true;
        let id = preview.id;

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);
        with_lesson(&mut mocks, preview);
        mocks.enrollments.expect_find().returning(|_, _| Ok(None));

        let (service, _) = service(mocks);
        let result = service.get_lesson(Some(actor(&student)), id).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_enrolled_student_keeps_access_after_archive() {
        let student = user(UserRole::Student);
        let student_id = student.id;
        let c = course(Uuid::new_v4(), CourseStatus::Archived, 1000);
        let course_id = c.id;
        let locked = lesson(course_id, 2);
        let id = locked.id;

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);
        with_lesson(&mut mocks, locked);
        mocks.enrollments.expect_find().returning(move |_, _| {
            Ok(Some(Enrollment {
                id: Uuid::new_v4(),
                user_id: student_id,
                course_id,
                order_id: None,
                enrolled_at: Utc::now(),
            }))
        });

        let (service, _) = service(mocks);
        let fetched = service.get_lesson(Some(actor(&student)), id).await.unwrap();
        assert!(fetched.video_url.is_some());
    }

    #[tokio::test]
    async fn test_owner_sees_draft_lessons() {
        let owner = user(UserRole::Instructor);
        let c = course(owner.id, CourseStatus::Draft, 1000);
        let draft = lesson(c.id, 1);
        let id = draft.id;

        let mut mocks = Mocks::default();
        with_course(&mut mocks, c);
        with_lesson(&mut mocks, draft);

        let (service, _) = service(mocks);
        assert!(service.get_lesson(Some(actor(&owner)), id).await.is_ok());
    }
}
