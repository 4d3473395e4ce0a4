//! User service - Profiles, roles and the public instructor page.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Actor, InstructorPage, InstructorProfile, User, UserResponse, UserRole};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{Collection, DualWriter, UnitOfWork};
use crate::types::{Paginated, PaginationParams};

/// User service trait for dependency injection.
///
/// Soft-deleted users are invisible to every operation.
#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_user(&self, id: Uuid) -> AppResult<User>;

    /// Update the caller's own name and bio
    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        bio: Option<String>,
    ) -> AppResult<User>;

    async fn list_users(&self, params: PaginationParams) -> AppResult<Paginated<UserResponse>>;

    async fn set_role(&self, actor: &Actor, id: Uuid, role: UserRole) -> AppResult<User>;

    /// Soft delete (sets deleted_at timestamp)
    async fn delete_user(&self, actor: &Actor, id: Uuid) -> AppResult<()>;

    /// Public profile with published courses
    async fn instructor_profile(&self, id: Uuid) -> AppResult<InstructorPage>;
}

/// Concrete implementation of UserService using Unit of Work.
pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
    writer: DualWriter,
}

impl<U: UnitOfWork> UserManager<U> {
    pub fn new(uow: Arc<U>, writer: DualWriter) -> Self {
        Self { uow, writer }
    }

    /// Keep the `instructors` collection in line with the user's role.
    async fn mirror_instructor(&self, user: &User) {
        if user.is_instructor() {
            self.writer
                .mirror(
                    Collection::Instructors,
                    user.id,
                    &InstructorProfile::from(user),
                )
                .await;
        } else {
            self.writer.remove(Collection::Instructors, user.id).await;
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.uow.users().find_by_id(id).await?.ok_or_not_found()
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        bio: Option<String>,
    ) -> AppResult<User> {
        let name = name.map(|n| n.trim().to_string());
        if matches!(&name, Some(n) if n.is_empty()) {
            return Err(AppError::validation("Name cannot be empty"));
        }

        let user = self.uow.users().update_profile(id, name, bio).await?;
        if user.is_instructor() {
            self.mirror_instructor(&user).await;
        }
        Ok(user)
    }

    async fn list_users(&self, params: PaginationParams) -> AppResult<Paginated<UserResponse>> {
        let (users, total) = self.uow.users().list(params).await?;
        Ok(Paginated::new(users, &params, total).map(UserResponse::from))
    }

    async fn set_role(&self, actor: &Actor, id: Uuid, role: UserRole) -> AppResult<User> {
        if actor.id == id {
            return Err(AppError::bad_request("You cannot change your own role"));
        }

        let user = self.uow.users().set_role(id, role).await?;
        self.mirror_instructor(&user).await;

        tracing::info!(user_id = %id, role = %role, changed_by = %actor.id, "User role changed");
        Ok(user)
    }

    async fn delete_user(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        if actor.id == id {
            return Err(AppError::bad_request("You cannot delete your own account"));
        }

        self.uow.users().delete(id).await?;
        self.writer.remove(Collection::Instructors, id).await;

        tracing::info!(user_id = %id, deleted_by = %actor.id, "User soft deleted");
        Ok(())
    }

    async fn instructor_profile(&self, id: Uuid) -> AppResult<InstructorPage> {
        let user = self.get_user(id).await?;
        let courses: Vec<_> = self
            .uow
            .courses()
            .list_by_instructor(id)
            .await?
            .into_iter()
            .filter(|c| c.is_published())
            .collect();

        if !user.is_instructor() && courses.is_empty() {
            return Err(AppError::NotFound);
        }

        Ok(InstructorPage {
            instructor: InstructorProfile::from(&user),
            courses,
        })
    }
}
