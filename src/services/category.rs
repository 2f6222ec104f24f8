//! Content category service
//!
//! The category list is tiny and never changes at runtime, so it is served
//! from the cache after the first read.

use crate::cache::{CacheLayer, SharedCache};
use crate::db::repositories::CategoryRepository;
use crate::models::ContentCategory;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

const CACHE_KEY_CATEGORY_LIST: &str = "category:list";

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: SharedCache,
    cache_ttl: Duration,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: SharedCache) -> Self {
        let cache_ttl = cache.default_ttl();
        Self { repo, cache, cache_ttl }
    }

    /// All categories ordered by id
    pub async fn list(&self) -> Result<Vec<ContentCategory>> {
        match self.cache.get::<Vec<ContentCategory>>(CACHE_KEY_CATEGORY_LIST).await {
            Ok(Some(list)) => return Ok(list),
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable category cache entry: {}", e),
        }

        let list = self.repo.list().await.context("Failed to list categories")?;
        if let Err(e) = self.cache.set(CACHE_KEY_CATEGORY_LIST, &list, self.cache_ttl).await {
            tracing::warn!("Failed to cache categories: {}", e);
        }
        Ok(list)
    }

    pub async fn get(&self, id: i64) -> Result<Option<ContentCategory>> {
        Ok(self.list().await?.into_iter().find(|c| c.id == id))
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }
}
