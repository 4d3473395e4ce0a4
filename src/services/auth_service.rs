//! Authentication service - Registration, login and token verification.
//!
//! Password hashing lives in the domain `Password` value object; repositories
//! are reached through the Unit of Work.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{Config, SECONDS_PER_HOUR, TOKEN_TYPE_BEARER};
use crate::domain::{InstructorProfile, Password, User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::infra::{Collection, DualWriter, UnitOfWork};

/// JWT claims payload
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token response returned after successful authentication
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Token expiration time in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new student or instructor
    async fn register(
        &self,
        email: String,
        password: String,
        name: String,
        role: UserRole,
    ) -> AppResult<User>;

    /// Login and return JWT token
    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse>;

    /// Verify JWT token and extract claims
    fn verify_token(&self, token: &str) -> AppResult<Claims>;
}

fn generate_token(user: &User, config: &Config) -> AppResult<TokenResponse> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(config.jwt_expiration_hours);

    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret_bytes()),
    )?;

    Ok(TokenResponse {
        access_token: token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        expires_in: config.jwt_expiration_hours * SECONDS_PER_HOUR,
    })
}

fn verify_token_internal(token: &str, config: &Config) -> AppResult<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Concrete implementation of AuthService using Unit of Work.
pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    writer: DualWriter,
    config: Config,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(uow: Arc<U>, writer: DualWriter, config: Config) -> Self {
        Self {
            uow,
            writer,
            config,
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn register(
        &self,
        email: String,
        password: String,
        name: String,
        role: UserRole,
    ) -> AppResult<User> {
        if role.is_admin() {
            return Err(AppError::validation(
                "Role must be either student or instructor",
            ));
        }

        let email = normalize_email(&email);
        // Soft-deleted accounts keep their email reserved
        if self
            .uow
            .users()
            .find_by_email_with_deleted(&email)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("Email is already registered"));
        }

        let password_hash = Password::new(&password)?.into_string();
        let user = self
            .uow
            .users()
            .create(email, password_hash, name.trim().to_string(), role)
            .await?;

        if user.is_instructor() {
            self.writer
                .mirror(
                    Collection::Instructors,
                    user.id,
                    &InstructorProfile::from(&user),
                )
                .await;
        }

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse> {
        let user = self.uow.users().find_by_email(&normalize_email(&email)).await?;

        // Verify against a dummy hash when the email is unknown so both paths
        // do the same work.
        let dummy_hash =
            "$argon2id$v=19$m=19456,t=2,p=1$dummysalt123456$dummyhash1234567890123456789012";
        let stored = match &user {
            Some(user) => Password::from_hash(user.password_hash.clone()),
            None => Password::from_hash(dummy_hash.to_string()),
        };
        let password_valid = stored.verify(&password);

        match user {
            Some(user) if password_valid => generate_token(&user, &self.config),
            _ => Err(AppError::InvalidCredentials),
        }
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        verify_token_internal(token, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryDocumentStore;
    use crate::services::test_support::{memory_writer, user, Mocks, TestUnitOfWork};
    use mockall::predicate::eq;

    fn service(
        mocks: Mocks,
    ) -> (Authenticator<TestUnitOfWork>, Arc<InMemoryDocumentStore>) {
        let (writer, store) = memory_writer();
        (
            Authenticator::new(mocks.into_uow(), writer, Config::for_tests()),
            store,
        )
    }

    #[tokio::test]
    async fn test_register_instructor_is_mirrored() {
        let mut mocks = Mocks::default();
        mocks
            .users
            .expect_find_by_email_with_deleted()
            .with(eq("grace@example.com"))
            .returning(|_| Ok(None));
        mocks
            .users
            .expect_create()
            .returning(|email, hash, name, role| {
                let mut u = user(role);
                u.email = email;
                u.password_hash = hash;
                u.name = name;
                Ok(u)
            });

        let (service, store) = service(mocks);
        let created = service
            .register(
                " Grace@Example.com ".into(),
                "longenough".into(),
                "Grace".into(),
                UserRole::Instructor,
            )
            .await
            .unwrap();

        assert_eq!(created.email, "grace@example.com");
        assert_ne!(created.password_hash, "longenough");
        assert_eq!(store.len(Collection::Instructors).await, 1);
    }

    #[tokio::test]
    async fn test_register_student_is_not_mirrored() {
        let mut mocks = Mocks::default();
        mocks
            .users
            .expect_find_by_email_with_deleted()
            .returning(|_| Ok(None));
        mocks
            .users
            .expect_create()
            .returning(|_, _, _, role| Ok(user(role)));

        let (service, store) = service(mocks);
        service
            .register(
                "s@example.com".into(),
                "longenough".into(),
                "S".into(),
                UserRole::Student,
            )
            .await
            .unwrap();

        assert_eq!(store.len(Collection::Instructors).await, 0);
    }

    #[tokio::test]
    async fn test_register_rejects_admin_role() {
        let (service, _) = service(Mocks::default());
        let result = service
            .register(
                "a@example.com".into(),
                "longenough".into(),
                "A".into(),
                UserRole::Admin,
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut mocks = Mocks::default();
        mocks
            .users
            .expect_find_by_email_with_deleted()
            .returning(|_| Ok(Some(user(UserRole::Student))));

        let (service, _) = service(mocks);
        let result = service
            .register(
                "ada@example.com".into(),
                "longenough".into(),
                "Ada".into(),
                UserRole::Student,
            )
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_login_and_verify() {
        let hash = Password::new("correct horse").unwrap().into_string();
        let mut account = user(UserRole::Instructor);
        account.password_hash = hash;
        let account_id = account.id;

        let mut mocks = Mocks::default();
        mocks
            .users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(account.clone())));

        let (service, _) = service(mocks);
        let token = service
            .login("ada@example.com".into(), "correct horse".into())
            .await
            .unwrap();
        assert_eq!(token.token_type, "Bearer");

        let claims = service.verify_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, account_id);
        assert_eq!(claims.role, "instructor");
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let mut mocks = Mocks::default();
        mocks.users.expect_find_by_email().returning(|_| Ok(None));

        let (service, _) = service(mocks);
        let result = service
            .login("nobody@example.com".into(), "whatever1".into())
            .await;

        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let (service, _) = service(Mocks::default());
        assert!(matches!(
            service.verify_token("not.a.token"),
            Err(AppError::Jwt(_))
        ));
    }
}
