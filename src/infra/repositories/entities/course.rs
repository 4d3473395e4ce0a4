//! Course database entity.

use sea_orm::entity::prelude::*;

use crate::domain::{Course, CourseStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub subtitle: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub thumbnail_url: Option<String>,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub published_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Course {
    fn from(model: Model) -> Self {
        Course {
            id: model.id,
            instructor_id: model.instructor_id,
            category_id: model.category_id,
            title: model.title,
            slug: model.slug,
            subtitle: model.subtitle,
            description: model.description,
            price_cents: model.price_cents,
            currency: model.currency,
            thumbnail_url: model.thumbnail_url,
            status: CourseStatus::from(model.status.as_str()),
            created_at: model.created_at,
            updated_at: model.updated_at,
            published_at: model.published_at,
        }
    }
}
