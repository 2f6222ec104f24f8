//! Content category repository
//!
//! The three content categories are seeded by migration and read-only at
//! runtime.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CategoryKind, ContentCategory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// All categories ordered by id
    async fn list(&self) -> Result<Vec<ContentCategory>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ContentCategory>>;
}

pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

fn to_category(id: i64, kind: &str, name: String) -> Result<ContentCategory> {
    Ok(ContentCategory {
        id,
        kind: CategoryKind::from_str(kind)?,
        name,
    })
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn list(&self) -> Result<Vec<ContentCategory>> {
        const SQL: &str = "SELECT id, kind, name FROM content_categories ORDER BY id";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(SQL)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list categories")?;
                rows.iter()
                    .map(|r| to_category(r.get("id"), r.get::<String, _>("kind").as_str(), r.get("name")))
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(SQL)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list categories")?;
                rows.iter()
                    .map(|r| to_category(r.get("id"), r.get::<String, _>("kind").as_str(), r.get("name")))
                    .collect()
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ContentCategory>> {
        const SQL: &str = "SELECT id, kind, name FROM content_categories WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SQL)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get category")?;
                row.map(|r| to_category(r.get("id"), r.get::<String, _>("kind").as_str(), r.get("name")))
                    .transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SQL)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get category")?;
                row.map(|r| to_category(r.get("id"), r.get::<String, _>("kind").as_str(), r.get("name")))
                    .transpose()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    #[tokio::test]
    async fn test_list_seeded_categories() {
        let repo = setup().await;
        let kinds: Vec<CategoryKind> = repo.list().await.unwrap().into_iter().map(|c| c.kind).collect();
        assert_eq!(kinds, CategoryKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let repo = setup().await;
        let resource = repo.get_by_id(3).await.unwrap().expect("resource category");
        assert_eq!(resource.kind, CategoryKind::Resource);
        assert!(repo.get_by_id(9).await.unwrap().is_none());
    }
}
