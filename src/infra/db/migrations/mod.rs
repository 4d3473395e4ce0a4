//! Database migrations.
//!
//! Each migration is a separate module following SeaORM conventions.
//! Migration names follow the pattern: m{YYYYMMDD}_{NNNNNN}_{description}

use sea_orm_migration::prelude::*;

mod m20260101_000001_create_users;
mod m20260101_000002_create_catalog;
mod m20260101_000003_create_learning;
mod m20260101_000004_create_commerce;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_users::Migration),
            Box::new(m20260101_000002_create_catalog::Migration),
            Box::new(m20260101_000003_create_learning::Migration),
            Box::new(m20260101_000004_create_commerce::Migration),
        ]
    }
}
