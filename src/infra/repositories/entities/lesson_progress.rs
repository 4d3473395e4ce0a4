use sea_orm::entity::prelude::*;

use crate::domain::LessonProgress;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "lesson_progress")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub lesson_id: Uuid,
    pub course_id: Uuid,
    pub position_seconds: i64,
    pub completed: bool,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for LessonProgress {
    fn from(model: Model) -> Self {
        LessonProgress {
            user_id: model.user_id,
            lesson_id: model.lesson_id,
            course_id: model.course_id,
            position_seconds: model.position_seconds,
            completed: model.completed,
            updated_at: model.updated_at,
        }
    }
}
