//! Course repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Course;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, course: &Course) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn get_by_code(&self, code: &str) -> Result<Option<Course>>;

    /// All courses ordered by code
    async fn list(&self) -> Result<Vec<Course>>;

    async fn exists(&self, id: i64) -> Result<bool>;
}

pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, course: &Course) -> Result<Course> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_course_sqlite(self.pool.sqlite()?, course).await,
            DatabaseDriver::Mysql => create_course_mysql(self.pool.mysql()?, course).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get course by ID")?;
                Ok(row.map(|r| row_to_course_sqlite(&r)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get course by ID")?;
                Ok(row.map(|r| row_to_course_mysql(&r)))
            }
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses WHERE code = ?", COURSE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(code)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get course by code")?;
                Ok(row.map(|r| row_to_course_sqlite(&r)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(code)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get course by code")?;
                Ok(row.map(|r| row_to_course_mysql(&r)))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Course>> {
        let sql = format!("SELECT {} FROM courses ORDER BY code ASC", COURSE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list courses")?;
                Ok(rows.iter().map(row_to_course_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list courses")?;
                Ok(rows.iter().map(row_to_course_mysql).collect())
            }
        }
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("SELECT COUNT(*) as count FROM courses WHERE id = ?")
                .bind(id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check course")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query("SELECT COUNT(*) as count FROM courses WHERE id = ?")
                .bind(id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check course")?
                .get("count"),
        };
        Ok(count > 0)
    }
}

const COURSE_COLUMNS: &str = "id, code, name, description, teacher_id, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_course_sqlite(pool: &SqlitePool, course: &Course) -> Result<Course> {
    let result = sqlx::query(
        r#"
        INSERT INTO courses (code, name, description, teacher_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&course.code)
    .bind(&course.name)
    .bind(&course.description)
    .bind(course.teacher_id)
    .bind(course.created_at)
    .bind(course.updated_at)
    .execute(pool)
    .await
    .context("Failed to create course")?;

    Ok(Course {
        id: result.last_insert_rowid(),
        ..course.clone()
    })
}

fn row_to_course_sqlite(row: &sqlx::sqlite::SqliteRow) -> Course {
    Course {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        description: row.get("description"),
        teacher_id: row.get("teacher_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_course_mysql(pool: &MySqlPool, course: &Course) -> Result<Course> {
    let result = sqlx::query(
        r#"
        INSERT INTO courses (code, name, description, teacher_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&course.code)
    .bind(&course.name)
    .bind(&course.description)
    .bind(course.teacher_id)
    .bind(course.created_at)
    .bind(course.updated_at)
    .execute(pool)
    .await
    .context("Failed to create course")?;

    Ok(Course {
        id: result.last_insert_id() as i64,
        ..course.clone()
    })
}

fn row_to_course_mysql(row: &sqlx::mysql::MySqlRow) -> Course {
    Course {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        description: row.get("description"),
        teacher_id: row.get("teacher_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::Utc;

    async fn setup() -> (SqlxCourseRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let teacher = SqlxUserRepository::new(pool.clone())
            .create(&User::new("prof".into(), "hash".into(), "Prof".into(), UserRole::Teacher))
            .await
            .unwrap();
        (SqlxCourseRepository::new(pool), teacher.id)
    }

    fn course(code: &str, teacher_id: i64) -> Course {
        let now = Utc::now();
        Course {
            id: 0,
            code: code.to_string(),
            name: format!("{} course", code),
            description: String::new(),
            teacher_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let (repo, teacher) = setup().await;
        let created = repo.create(&course("CS101", teacher)).await.unwrap();

        assert!(repo.exists(created.id).await.unwrap());
        assert!(!repo.exists(created.id + 1).await.unwrap());
        assert_eq!(repo.get_by_code("CS101").await.unwrap().unwrap().id, created.id);
        assert_eq!(repo.get_by_id(created.id).await.unwrap().unwrap().code, "CS101");
    }

    #[tokio::test]
    async fn test_list_ordered_by_code() {
        let (repo, teacher) = setup().await;
        repo.create(&course("MA200", teacher)).await.unwrap();
        repo.create(&course("CS101", teacher)).await.unwrap();

        let codes: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.code).collect();
        assert_eq!(codes, vec!["CS101", "MA200"]);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let (repo, teacher) = setup().await;
        repo.create(&course("CS101", teacher)).await.unwrap();
        assert!(repo.create(&course("CS101", teacher)).await.is_err());
    }
}
