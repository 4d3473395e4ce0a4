//! Enrollment service - Free enrollment, "my learning" and playback progress.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::enrollment::percent;
use crate::domain::{
    CourseProgress, Enrollment, EnrollmentStatus, EnrollmentSummary, LessonProgress,
    ProgressUpdate,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{Collection, DualWriter, UnitOfWork};

#[async_trait]
pub trait EnrollmentService: Send + Sync {
    /// Enroll in a published free course
    async fn enroll_free(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Enrollment>;

    async fn my_enrollments(&self, user_id: Uuid) -> AppResult<Vec<EnrollmentSummary>>;

    async fn enrollment_status(&self, user_id: Uuid, course_id: Uuid)
        -> AppResult<EnrollmentStatus>;

    /// Store a playback report for an enrolled student
    async fn record_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        update: ProgressUpdate,
    ) -> AppResult<LessonProgress>;

    async fn course_progress(&self, user_id: Uuid, course_id: Uuid) -> AppResult<CourseProgress>;
}

pub struct EnrollmentManager<U: UnitOfWork> {
    uow: Arc<U>,
    writer: DualWriter,
}

impl<U: UnitOfWork> EnrollmentManager<U> {
    pub fn new(uow: Arc<U>, writer: DualWriter) -> Self {
        Self { uow, writer }
    }

    async fn ensure_enrolled(&self, user_id: Uuid, course_id: Uuid) -> AppResult<()> {
        match self.uow.enrollments().find(user_id, course_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::Forbidden),
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> EnrollmentService for EnrollmentManager<U> {
    async fn enroll_free(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Enrollment> {
        let course = self
            .uow
            .courses()
            .find_by_id(course_id)
            .await?
            .ok_or_not_found()?;
        course.ensure_purchasable_by(user_id)?;

        if !course.is_free() {
            return Err(AppError::payment_required(
                "This course must be purchased before enrolling",
            ));
        }

        let enrollment = self
            .uow
            .enrollments()
            .create(user_id, course_id, None)
            .await?;
        self.writer
            .mirror(Collection::Enrollments, enrollment.id, &enrollment)
            .await;

        tracing::info!(user_id = %user_id, course_id = %course_id, "Enrolled in free course");
        Ok(enrollment)
    }

    async fn my_enrollments(&self, user_id: Uuid) -> AppResult<Vec<EnrollmentSummary>> {
        let enrollments = self.uow.enrollments().list_by_user(user_id).await?;
        if enrollments.is_empty() {
            return Ok(Vec::new());
        }

        let course_ids: Vec<Uuid> = enrollments.iter().map(|e| e.course_id).collect();
        let lesson_counts = self
            .uow
            .lessons()
            .counts_by_course(course_ids.clone())
            .await?;
        let mut courses: HashMap<Uuid, _> = self
            .uow
            .courses()
            .find_many(course_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let progress = self.uow.progress().list_for_user(user_id).await?;

        let mut summaries = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let Some(course) = courses.remove(&enrollment.course_id) else {
                continue;
            };
            let total = lesson_counts.get(&course.id).copied().unwrap_or(0) as u32;
            let completed = progress
                .iter()
                .filter(|p| p.course_id == course.id && p.completed)
                .count() as u32;

            summaries.push(EnrollmentSummary {
                progress_percent: percent(completed, total),
                enrollment,
                course,
            });
        }

        Ok(summaries)
    }

    async fn enrollment_status(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> AppResult<EnrollmentStatus> {
        let enrollment = self.uow.enrollments().find(user_id, course_id).await?;
        Ok(EnrollmentStatus {
            enrolled: enrollment.is_some(),
            enrollment,
        })
    }

    async fn record_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        update: ProgressUpdate,
    ) -> AppResult<LessonProgress> {
        let lesson = self
            .uow
            .lessons()
            .find_by_id(lesson_id)
            .await?
            .ok_or_not_found()?;
        self.ensure_enrolled(user_id, lesson.course_id).await?;

        let mut progress = self
            .uow
            .progress()
            .find(user_id, lesson_id)
            .await?
            .unwrap_or_else(|| LessonProgress::start(user_id, &lesson));
        progress.record(
            update.position_seconds,
            update.completed,
            lesson.duration_seconds,
        );

        self.uow.progress().save(progress).await
    }

    async fn course_progress(&self, user_id: Uuid, course_id: Uuid) -> AppResult<CourseProgress> {
        self.ensure_enrolled(user_id, course_id).await?;

        let lessons = self.uow.lessons().list_by_course(course_id).await?;
        let progress = self
            .uow
            .progress()
            .list_for_course(user_id, course_id)
            .await?;

        Ok(CourseProgress::compute(course_id, &lessons, &progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourseStatus, UserRole};
    use crate::infra::InMemoryDocumentStore;
    use crate::services::test_support::{course, lesson, memory_writer, user, Mocks, TestUnitOfWork};
    use chrono::Utc;

    fn service(mocks: Mocks) -> (EnrollmentManager<TestUnitOfWork>, Arc<InMemoryDocumentStore>) {
        let (writer, store) = memory_writer();
        (EnrollmentManager::new(mocks.into_uow(), writer), store)
    }

    fn enrollment(user_id: Uuid, course_id: Uuid) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            order_id: None,
            enrolled_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_enroll_free_course() {
        let student = user(UserRole::Student);
        let c = course(Uuid::new_v4(), CourseStatus::Published, 0);
        let course_id = c.id;

        let mut mocks = Mocks::default();
        mocks
            .courses
            .expect_find_by_id()
            .returning(move |_| Ok(Some(c.clone())));
        mocks
            .enrollments
            .expect_create()
            .returning(|user_id, course_id, _| Ok(enrollment(user_id, course_id)));

        let (service, store) = service(mocks);
        let created = service.enroll_free(student.id, course_id).await.unwrap();

        assert_eq!(created.course_id, course_id);
        assert!(created.order_id.is_none());
        assert_eq!(store.len(Collection::Enrollments).await, 1);
    }

    #[tokio::test]
    async fn test_paid_course_requires_payment() {
        let c = course(Uuid::new_v4(), CourseStatus::Published, 2500);
        let course_id = c.id;

        let mut mocks = Mocks::default();
        mocks
            .courses
            .expect_find_by_id()
            .returning(move |_| Ok(Some(c.clone())));
        mocks.enrollments.expect_create().never();

        let (service, _) = service(mocks);
        let result = service.enroll_free(Uuid::new_v4(), course_id).await;
        assert!(matches!(result, Err(AppError::PaymentRequired(_))));
    }

    #[tokio::test]
    async fn test_instructor_cannot_enroll_in_own_course() {
        let instructor = user(UserRole::Instructor);
        let c = course(instructor.id, CourseStatus::Published, 0);
        let course_id = c.id;

        let mut mocks = Mocks::default();
        mocks
            .courses
            .expect_find_by_id()
            .returning(move |_| Ok(Some(c.clone())));

        let (service, _) = service(mocks);
        let result = service.enroll_free(instructor.id, course_id).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_duplicate_enrollment_conflicts() {
        let c = course(Uuid::new_v4(), CourseStatus::Published, 0);
        let course_id = c.id;

        let mut mocks = Mocks::default();
        mocks
            .courses
            .expect_find_by_id()
            .returning(move |_| Ok(Some(c.clone())));
        mocks
            .enrollments
            .expect_create()
            .returning(|_, _, _| Err(AppError::conflict("Already enrolled in this course")));

        let (service, store) = service(mocks);
        let result = service.enroll_free(Uuid::new_v4(), course_id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(store.len(Collection::Enrollments).await, 0);
    }

    #[tokio::test]
    async fn test_progress_requires_enrollment() {
        let l = lesson(Uuid::new_v4(), 1);
        let lesson_id = l.id;

        let mut mocks = Mocks::default();
        mocks
            .lessons
            .expect_find_by_id()
            .returning(move |_| Ok(Some(l.clone())));
        mocks.enrollments.expect_find().returning(|_, _| Ok(None));
        mocks.progress.expect_save().never();

        let (service, _) = service(mocks);
        let result = service
            .record_progress(
                Uuid::new_v4(),
                lesson_id,
                ProgressUpdate {
                    position_seconds: 30,
                    completed: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_progress_starts_and_completes() {
        let user_id = Uuid::new_v4();
        let l = lesson(Uuid::new_v4(), 1);
        let lesson_id = l.id;
        let course_id = l.course_id;

        let mut mocks = Mocks::default();
        mocks
            .lessons
            .expect_find_by_id()
            .returning(move |_| Ok(Some(l.clone())));
        mocks
            .enrollments
            .expect_find()
            .returning(move |u, c| Ok(Some(enrollment(u, c))));
        mocks.progress.expect_find().returning(|_, _| Ok(None));
        mocks.progress.expect_save().returning(Ok);

        let (service, _) = service(mocks);
        let saved = service
            .record_progress(
                user_id,
                lesson_id,
                ProgressUpdate {
                    position_seconds: 580,
                    completed: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(saved.course_id, course_id);
        assert_eq!(saved.position_seconds, 580);
        assert!(saved.completed);
    }

    #[tokio::test]
    async fn test_my_enrollments_reports_percent() {
        let user_id = Uuid::new_v4();
        let c = course(Uuid::new_v4(), CourseStatus::Published, 1000);
        let course_id = c.id;
        let empty = course(Uuid::new_v4(), CourseStatus::Published, 0);
        let empty_id = empty.id;
        let l = lesson(course_id, 1);

        let mut mocks = Mocks::default();
        mocks
            .enrollments
            .expect_list_by_user()
            .returning(move |u| Ok(vec![enrollment(u, course_id), enrollment(u, empty_id)]));
        mocks
            .courses
            .expect_find_many()
            .returning(move |_| Ok(vec![c.clone(), empty.clone()]));
        mocks.progress.expect_list_for_user().returning(move |u| {
            let mut done = LessonProgress::start(u, &l);
            done.completed = true;
            Ok(vec![done])
        });
        mocks.lessons.expect_count_by_course().never();
        mocks
            .lessons
            .expect_counts_by_course()
            .times(1)
            .returning(move |_| Ok(HashMap::from([(course_id, 4)])));

        let (service, _) = service(mocks);
        let rows = service.my_enrollments(user_id).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].progress_percent, 25);
        assert_eq!(rows[1].course.id, empty_id);
        assert_eq!(rows[1].progress_percent, 0);
    }

    #[tokio::test]
    async fn test_status_when_not_enrolled() {
        let mut mocks = Mocks::default();
        mocks.enrollments.expect_find().returning(|_, _| Ok(None));

        let (service, _) = service(mocks);
        let status = service
            .enrollment_status(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();
        assert!(!status.enrolled);
        assert!(status.enrollment.is_none());
    }
}
