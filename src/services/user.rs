//! User service
//!
//! Registration, login and session handling:
//! - the first account registered becomes the admin
//! - everyone else registers as a student or a teacher
//! - sessions expire after `auth.session_days`; expired ones are removed on use

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User, UserRole};
use crate::services::password::{hash_password_async, verify_password_async};
use anyhow::Context;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_SESSION_DAYS: i64 = 7;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_DISPLAY_NAME_LEN: usize = 64;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{3,32}$").expect("username pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("User already exists: {0}")]
    UserExists(String),

    /// Wrong username or password
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl UserServiceError {
    fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Requested role; only student and teacher may be requested
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_days(user_repo, session_repo, DEFAULT_SESSION_DAYS)
    }

    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
        }
    }

    /// Session lifetime in days, used for the cookie Max-Age
    pub fn session_days(&self) -> i64 {
        self.session_days
    }

    /// Register an account.
    ///
    /// The first account becomes the admin regardless of the requested role.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        validate_username(&username)?;
        validate_password(&input.password)?;

        let requested = input.role.unwrap_or_default();
        if requested == UserRole::Admin {
            return Err(UserServiceError::validation("role", "admin role cannot be requested"));
        }

        let display_name = match input.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => username.clone(),
        };
        if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(UserServiceError::validation(
                "display_name",
                format!("must be at most {} characters", MAX_DISPLAY_NAME_LEN),
            ));
        }

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let role = if self.user_repo.count().await.context("Failed to count users")? == 0 {
            UserRole::Admin
        } else {
            requested
        };

        let password_hash = hash_password_async(input.password).await?;
        let user = User::new(username, password_hash, display_name, role);
        let created = self.user_repo.create(&user).await.context("Failed to create user")?;

        tracing::info!(user_id = created.id, role = %created.role, "User registered");
        Ok(created)
    }

    /// Check credentials and open a session
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to find user")?
            .ok_or_else(invalid)?;

        if !verify_password_async(input.password, user.password_hash.clone()).await? {
            return Err(invalid());
        }

        let session = Session::issue(user.id, self.session_days);
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok((user, session))
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind a session token, or `None` for unknown or expired
    /// tokens. Expired sessions are deleted.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo
                .delete(&session.id)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        Ok(self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get session user")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user by ID")?)
    }

    /// Remove every expired session; returns how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to clean up sessions")?)
    }
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(UserServiceError::validation(
            "username",
            "must be 3-32 letters, digits or underscores",
        ))
    }
}

fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserServiceError::validation(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    fn register_input(username: &str, role: Option<UserRole>) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            password: "password123".to_string(),
            display_name: None,
            role,
        }
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let (_pool, service) = setup().await;

        let first = service.register(register_input("founder", None)).await.unwrap();
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(first.display_name, "founder");

        let second = service.register(register_input("student1", None)).await.unwrap();
        assert_eq!(second.role, UserRole::Student);

        let teacher = service
            .register(register_input("prof_x", Some(UserRole::Teacher)))
            .await
            .unwrap();
        assert_eq!(teacher.role, UserRole::Teacher);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let (_pool, service) = setup().await;

        let short = service.register(register_input("ab", None)).await;
        assert!(matches!(short, Err(UserServiceError::Validation { field: "username", .. })));

        let spaced = service.register(register_input("has space", None)).await;
        assert!(matches!(spaced, Err(UserServiceError::Validation { field: "username", .. })));

        let mut weak = register_input("weakling", None);
        weak.password = "short".into();
        assert!(matches!(
            service.register(weak).await,
            Err(UserServiceError::Validation { field: "password", .. })
        ));

        let admin = service.register(register_input("wannabe", Some(UserRole::Admin))).await;
        assert!(matches!(admin, Err(UserServiceError::Validation { field: "role", .. })));
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let (_pool, service) = setup().await;
        service.register(register_input("alice", None)).await.unwrap();
        assert!(matches!(
            service.register(register_input("alice", None)).await,
            Err(UserServiceError::UserExists(_))
        ));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let (_pool, service) = setup().await;
        let user = service.register(register_input("alice", None)).await.unwrap();

        let (logged_in, session) = service
            .login(LoginInput {
                username: "alice".into(),
                password: "password123".into(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let validated = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(validated.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (_pool, service) = setup().await;
        service.register(register_input("alice", None)).await.unwrap();

        for (username, password) in [("alice", "wrong-password"), ("nobody", "password123")] {
            let result = service
                .login(LoginInput {
                    username: username.into(),
                    password: password.into(),
                })
                .await;
            assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
        }
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_removed() {
        let (pool, service) = setup().await;
        let user = service.register(register_input("alice", None)).await.unwrap();

        let mut session = Session::issue(user.id, 1);
        session.expires_at = Utc::now() - chrono::Duration::minutes(1);
        SqlxSessionRepository::new(pool.clone()).create(&session).await.unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(SqlxSessionRepository::new(pool)
            .get_by_id(&session.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (pool, service) = setup().await;
        let user = service.register(register_input("alice", None)).await.unwrap();

        let mut stale = Session::issue(user.id, 1);
        stale.expires_at = Utc::now() - chrono::Duration::hours(2);
        SqlxSessionRepository::new(pool).create(&stale).await.unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 1);
    }
}
