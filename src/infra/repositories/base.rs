//! Helpers shared by the repository implementations.

use sea_orm::{DatabaseConnection, DbErr, EntityTrait, FromQueryResult, PaginatorTrait, Select, SqlErr};

use crate::errors::{AppError, AppResult};
use crate::types::PaginationParams;

/// Fetch one page of `select` plus the total row count.
pub async fn fetch_page<E>(
    select: Select<E>,
    db: &DatabaseConnection,
    params: &PaginationParams,
) -> AppResult<(Vec<E::Model>, u64)>
where
    E: EntityTrait,
    E::Model: FromQueryResult + Sized + Send + Sync + 'static,
{
    let paginator = select.paginate(db, params.limit());
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(params.page().saturating_sub(1)).await?;
    Ok((data, total))
}

/// Map a unique-constraint violation to `Conflict(message)`.
pub fn conflict_on_unique(err: DbErr, message: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::conflict(message),
        _ => AppError::from(err),
    }
}
