//! Course service
//!
//! Courses only exist to scope forum posts: teachers and admins create
//! them, everyone can read them.

use crate::db::repositories::CourseRepository;
use crate::models::{Course, CreateCourseInput, User};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const MAX_CODE_LEN: usize = 32;
const MAX_NAME_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    #[error("Course not found: {0}")]
    NotFound(i64),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Course code already exists: {0}")]
    CodeTaken(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct CourseService {
    repo: Arc<dyn CourseRepository>,
}

impl CourseService {
    pub fn new(repo: Arc<dyn CourseRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, actor: &User, input: CreateCourseInput) -> Result<Course, CourseServiceError> {
        if !actor.can_create_course() {
            return Err(CourseServiceError::PermissionDenied(
                "Only teachers and admins can create courses".to_string(),
            ));
        }

        let code = input.code.trim().to_uppercase();
        let name = input.name.trim().to_string();
        check_length("code", &code, MAX_CODE_LEN)?;
        check_length("name", &name, MAX_NAME_LEN)?;

        if self
            .repo
            .get_by_code(&code)
            .await
            .context("Failed to check course code")?
            .is_some()
        {
            return Err(CourseServiceError::CodeTaken(code));
        }

        let now = Utc::now();
        let course = Course {
            id: 0,
            code,
            name,
            description: input.description.trim().to_string(),
            teacher_id: actor.id,
            created_at: now,
            updated_at: now,
        };
        let created = self.repo.create(&course).await.context("Failed to create course")?;

        tracing::info!(course_id = created.id, code = %created.code, "Course created");
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Course, CourseServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .ok_or(CourseServiceError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Course>, CourseServiceError> {
        Ok(self.repo.list().await.context("Failed to list courses")?)
    }
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), CourseServiceError> {
    let message = if value.is_empty() {
        "must not be empty".to_string()
    } else if value.chars().count() > max {
        format!("must be at most {} characters", max)
    } else {
        return Ok(());
    };
    Err(CourseServiceError::Validation { field, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCourseRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::UserRole;

    async fn setup() -> (CourseService, User, User) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::new(pool.clone());
        let teacher = users
            .create(&User::new("prof".into(), "hash".into(), "Prof".into(), UserRole::Teacher))
            .await
            .unwrap();
        let student = users
            .create(&User::new("stud".into(), "hash".into(), "Stud".into(), UserRole::Student))
            .await
            .unwrap();
        (CourseService::new(SqlxCourseRepository::boxed(pool)), teacher, student)
    }

    fn input(code: &str) -> CreateCourseInput {
        CreateCourseInput {
            code: code.to_string(),
            name: "Algorithms".to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_teacher_creates_course() {
        let (service, teacher, _) = setup().await;
        let course = service.create(&teacher, input(" cs201 ")).await.unwrap();

        assert_eq!(course.code, "CS201");
        assert_eq!(course.teacher_id, teacher.id);
        assert_eq!(service.get(course.id).await.unwrap().name, "Algorithms");
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_student_cannot_create_course() {
        let (service, _, student) = setup().await;
        assert!(matches!(
            service.create(&student, input("CS201")).await,
            Err(CourseServiceError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_codes() {
        let (service, teacher, _) = setup().await;
        service.create(&teacher, input("CS201")).await.unwrap();

        assert!(matches!(
            service.create(&teacher, input("cs201")).await,
            Err(CourseServiceError::CodeTaken(_))
        ));
        assert!(matches!(
            service.create(&teacher, input("  ")).await,
            Err(CourseServiceError::Validation { field: "code", .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_course() {
        let (service, _, _) = setup().await;
        assert!(matches!(service.get(42).await, Err(CourseServiceError::NotFound(42))));
    }
}
