use sea_orm::entity::prelude::*;

use crate::domain::Lesson;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "lessons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub slug: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration_seconds: i64,
    pub position: i32,
    pub is_preview: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Lesson {
    fn from(model: Model) -> Self {
        Lesson {
            id: model.id,
            course_id: model.course_id,
            title: model.title,
            slug: model.slug,
            description: model.description,
            video_url: model.video_url,
            duration_seconds: model.duration_seconds,
            position: model.position,
            is_preview: model.is_preview,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
