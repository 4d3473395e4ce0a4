//! Enrollments and lesson playback progress.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{Course, Lesson};
use crate::config::LESSON_COMPLETION_PERCENT;

/// Enrollment entity; also the `enrollments` document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    /// Order that granted access; `None` for free courses
    pub order_id: Option<Uuid>,
    pub enrolled_at: DateTime<Utc>,
}

/// Enrollment lookup result for a single course
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnrollmentStatus {
    pub enrolled: bool,
    pub enrollment: Option<Enrollment>,
}

/// One row of "my learning"
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnrollmentSummary {
    pub enrollment: Enrollment,
    pub course: Course,
    pub progress_percent: u8,
}

/// Playback state of one lesson for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LessonProgress {
    pub user_id: Uuid,
    pub lesson_id: Uuid,
    pub course_id: Uuid,
    pub position_seconds: i64,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

impl LessonProgress {
    pub fn start(user_id: Uuid, lesson: &Lesson) -> Self {
        Self {
            user_id,
            lesson_id: lesson.id,
            course_id: lesson.course_id,
            position_seconds: 0,
            completed: false,
            updated_at: Utc::now(),
        }
    }

    /// Apply a playback report.
    ///
    /// The position is clamped to `[0, duration]` when the duration is known.
    /// Completion never reverts: once completed, a lesson stays completed.
    pub fn record(&mut self, position_seconds: i64, completed: Option<bool>, duration_seconds: i64) {
        let mut position = position_seconds.max(0);
        if duration_seconds > 0 {
            position = position.min(duration_seconds);
        }

        let watched_enough = duration_seconds > 0
            && position.saturating_mul(100)
                >= duration_seconds.saturating_mul(LESSON_COMPLETION_PERCENT);

        self.position_seconds = position;
        self.completed = self.completed || completed.unwrap_or(false) || watched_enough;
        self.updated_at = Utc::now();
    }
}

/// Playback report from the player
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProgressUpdate {
    #[validate(range(min = 0, message = "Position cannot be negative"))]
    pub position_seconds: i64,
    pub completed: Option<bool>,
}

/// Per-lesson line of a course progress report
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LessonProgressEntry {
    pub lesson_id: Uuid,
    pub position_seconds: i64,
    pub completed: bool,
}

/// Aggregate progress of a user through a course
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CourseProgress {
    pub course_id: Uuid,
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub percent: u8,
    /// Most recently watched lesson
    pub last_lesson_id: Option<Uuid>,
    pub lessons: Vec<LessonProgressEntry>,
}

impl CourseProgress {
    /// Fold the stored progress rows over the course's current lessons.
    /// Rows for lessons that no longer exist are ignored.
    pub fn compute(course_id: Uuid, lessons: &[Lesson], progress: &[LessonProgress]) -> Self {
        let by_lesson: HashMap<Uuid, &LessonProgress> =
            progress.iter().map(|p| (p.lesson_id, p)).collect();

        let entries: Vec<LessonProgressEntry> = lessons
            .iter()
            .map(|lesson| match by_lesson.get(&lesson.id) {
                Some(p) => LessonProgressEntry {
                    lesson_id: lesson.id,
                    position_seconds: p.position_seconds,
                    completed: p.completed,
                },
                None => LessonProgressEntry {
                    lesson_id: lesson.id,
                    position_seconds: 0,
                    completed: false,
                },
            })
            .collect();

        let total_lessons = entries.len() as u32;
        let completed_lessons = entries.iter().filter(|e| e.completed).count() as u32;

        let last_lesson_id = lessons
            .iter()
            .filter_map(|l| by_lesson.get(&l.id))
            .max_by_key(|p| p.updated_at)
            .map(|p| p.lesson_id);

        Self {
            course_id,
            total_lessons,
            completed_lessons,
            percent: percent(completed_lessons, total_lessons),
            last_lesson_id,
            lessons: entries,
        }
    }
}

/// `floor(completed * 100 / total)`, 0 for an empty course.
pub fn percent(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed.min(total) as u64 * 100) / total as u64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn lesson(course_id: Uuid, position: i32, duration: i64) -> Lesson {
        let now = Utc::now();
        Lesson {
            id: Uuid::new_v4(),
            course_id,
            title: format!("Lesson {}", position),
            slug: format!("lesson-{}", position),
            description: None,
            video_url: None,
            duration_seconds: duration,
            position,
            is_preview: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_record_clamps_position() {
        let l = lesson(Uuid::new_v4(), 1, 100);
        let mut p = LessonProgress::start(Uuid::new_v4(), &l);

        p.record(500, None, 100);
        assert_eq!(p.position_seconds, 100);

        let mut q = LessonProgress::start(Uuid::new_v4(), &l);
        q.record(-5, None, 100);
        assert_eq!(q.position_seconds, 0);
        assert!(!q.completed);
    }

    #[test]
    fn test_record_completes_at_threshold() {
        let l = lesson(Uuid::new_v4(), 1, 100);
        let mut p = LessonProgress::start(Uuid::new_v4(), &l);

        p.record(89, None, 100);
        assert!(!p.completed);
        p.record(90, None, 100);
        assert!(p.completed);
    }

    #[test]
    fn test_completion_is_sticky() {
        let l = lesson(Uuid::new_v4(), 1, 0);
        let mut p = LessonProgress::start(Uuid::new_v4(), &l);

        p.record(10, Some(true), 0);
        assert!(p.completed);
        p.record(0, Some(false), 0);
        assert!(p.completed);
        assert_eq!(p.position_seconds, 0);
    }

    #[test]
    fn test_unknown_duration_never_auto_completes() {
        let l = lesson(Uuid::new_v4(), 1, 0);
        let mut p = LessonProgress::start(Uuid::new_v4(), &l);
        p.record(10_000, None, 0);
        assert_eq!(p.position_seconds, 10_000);
        assert!(!p.completed);
    }

    #[test]
    fn test_huge_duration_does_not_overflow() {
        let huge = i64::MAX / 2;
        let l = lesson(Uuid::new_v4(), 1, huge);
        let mut p = LessonProgress::start(Uuid::new_v4(), &l);

        p.record(1, None, huge);
        assert_eq!(p.position_seconds, 1);
        assert!(!p.completed);

        p.record(i64::MAX, None, huge);
        assert_eq!(p.position_seconds, huge);
        assert!(p.completed);
    }

    #[test]
    fn test_percent_floors() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 66);
        assert_eq!(percent(3, 3), 100);
    }

    #[test]
    fn test_course_progress_compute() {
        let course_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let lessons = vec![
            lesson(course_id, 1, 60),
            lesson(course_id, 2, 60),
            lesson(course_id, 3, 60),
        ];

        let mut first = LessonProgress::start(user_id, &lessons[0]);
        first.record(60, None, 60);
        let mut second = LessonProgress::start(user_id, &lessons[1]);
        second.record(10, None, 60);
        second.updated_at = first.updated_at + Duration::seconds(5);

        let orphan = LessonProgress {
            user_id,
            lesson_id: Uuid::new_v4(),
            course_id,
            position_seconds: 1,
            completed: true,
            updated_at: first.updated_at + Duration::seconds(60),
        };

        let report = CourseProgress::compute(course_id, &lessons, &[first, second.clone(), orphan]);

        assert_eq!(report.total_lessons, 3);
        assert_eq!(report.completed_lessons, 1);
        assert_eq!(report.percent, 33);
        assert_eq!(report.last_lesson_id, Some(second.lesson_id));
        assert_eq!(report.lessons.len(), 3);
        assert_eq!(report.lessons[1].position_seconds, 10);
        assert!(!report.lessons[2].completed);
    }
}
