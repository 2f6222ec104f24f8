//! Database migrations
//!
//! Migrations are embedded as SQL strings, one flavour per backend, and
//! recorded in a `_migrations` table so each version runs exactly once.
//!
//! ```ignore
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```
//!
//! Forum rows (`forum_post_likes`, `forum_post_collects`, `forum_comments`,
//! `forum_comment_likes`) reference their post without `ON DELETE CASCADE`:
//! dependents are removed explicitly by the post repository, and the foreign
//! keys reject any delete that would leave them orphaned.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique, increasing version number
    pub version: i32,
    pub name: &'static str,
    pub up_sqlite: &'static str,
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(32) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                display_name VARCHAR(64) NOT NULL,
                role VARCHAR(16) NOT NULL DEFAULT 'student',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(32) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                display_name VARCHAR(64) NOT NULL,
                role VARCHAR(16) NOT NULL DEFAULT 'student',
                created_at TIMESTAMP(6) NOT NULL,
                updated_at TIMESTAMP(6) NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP(6) NOT NULL,
                created_at TIMESTAMP(6) NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_courses",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code VARCHAR(32) NOT NULL UNIQUE,
                name VARCHAR(128) NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                teacher_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (teacher_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_courses_teacher_id ON courses(teacher_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS courses (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                code VARCHAR(32) NOT NULL UNIQUE,
                name VARCHAR(128) NOT NULL,
                description TEXT NOT NULL,
                teacher_id BIGINT NOT NULL,
                created_at TIMESTAMP(6) NOT NULL,
                updated_at TIMESTAMP(6) NOT NULL,
                FOREIGN KEY (teacher_id) REFERENCES users(id)
            );
            CREATE INDEX idx_courses_teacher_id ON courses(teacher_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_content_categories",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS content_categories (
                id INTEGER PRIMARY KEY,
                kind VARCHAR(16) NOT NULL UNIQUE,
                name VARCHAR(64) NOT NULL
            );
            INSERT OR IGNORE INTO content_categories (id, kind, name) VALUES
                (1, 'qa', 'Questions & Answers'),
                (2, 'knowledge', 'Knowledge Sharing'),
                (3, 'resource', 'Resource Sharing');
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS content_categories (
                id BIGINT PRIMARY KEY,
                kind VARCHAR(16) NOT NULL UNIQUE,
                name VARCHAR(64) NOT NULL
            );
            INSERT IGNORE INTO content_categories (id, kind, name) VALUES
                (1, 'qa', 'Questions & Answers'),
                (2, 'knowledge', 'Knowledge Sharing'),
                (3, 'resource', 'Resource Sharing');
        "#,
    },
    Migration {
        version: 5,
        name: "create_forum_posts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS forum_posts (
                id VARCHAR(36) PRIMARY KEY,
                author_id INTEGER NOT NULL,
                course_id INTEGER,
                category_id INTEGER,
                title VARCHAR(256) NOT NULL,
                content TEXT NOT NULL,
                tags VARCHAR(512) NOT NULL DEFAULT '',
                is_anonymous BOOLEAN NOT NULL DEFAULT 0,
                like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
                collect_count INTEGER NOT NULL DEFAULT 0 CHECK (collect_count >= 0),
                comment_count INTEGER NOT NULL DEFAULT 0 CHECK (comment_count >= 0),
                view_count INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
                heat_score REAL NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id),
                FOREIGN KEY (course_id) REFERENCES courses(id),
                FOREIGN KEY (category_id) REFERENCES content_categories(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_forum_posts_course_heat ON forum_posts(course_id, heat_score DESC);
            CREATE INDEX IF NOT EXISTS idx_forum_posts_created_at ON forum_posts(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_forum_posts_author_id ON forum_posts(author_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS forum_posts (
                id VARCHAR(36) PRIMARY KEY,
                author_id BIGINT NOT NULL,
                course_id BIGINT NULL,
                category_id BIGINT NULL,
                title VARCHAR(256) NOT NULL,
                content LONGTEXT NOT NULL,
                tags VARCHAR(512) NOT NULL DEFAULT '',
                is_anonymous BOOLEAN NOT NULL DEFAULT FALSE,
                like_count BIGINT NOT NULL DEFAULT 0,
                collect_count BIGINT NOT NULL DEFAULT 0,
                comment_count BIGINT NOT NULL DEFAULT 0,
                view_count BIGINT NOT NULL DEFAULT 0,
                heat_score DOUBLE NOT NULL DEFAULT 0,
                created_at TIMESTAMP(6) NOT NULL,
                updated_at TIMESTAMP(6) NOT NULL,
                CHECK (like_count >= 0),
                CHECK (collect_count >= 0),
                CHECK (comment_count >= 0),
                CHECK (view_count >= 0),
                FOREIGN KEY (author_id) REFERENCES users(id),
                FOREIGN KEY (course_id) REFERENCES courses(id),
                FOREIGN KEY (category_id) REFERENCES content_categories(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_forum_posts_course_heat ON forum_posts(course_id, heat_score DESC);
            CREATE INDEX idx_forum_posts_created_at ON forum_posts(created_at DESC);
            CREATE INDEX idx_forum_posts_author_id ON forum_posts(author_id);
        "#,
    },
    Migration {
        version: 6,
        name: "create_forum_post_interactions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS forum_post_likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id VARCHAR(36) NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (post_id, user_id),
                FOREIGN KEY (post_id) REFERENCES forum_posts(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
            CREATE TABLE IF NOT EXISTS forum_post_collects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id VARCHAR(36) NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (post_id, user_id),
                FOREIGN KEY (post_id) REFERENCES forum_posts(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_forum_post_collects_user ON forum_post_collects(user_id, created_at DESC);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS forum_post_likes (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                post_id VARCHAR(36) NOT NULL,
                user_id BIGINT NOT NULL,
                created_at TIMESTAMP(6) NOT NULL,
                UNIQUE KEY uk_forum_post_likes (post_id, user_id),
                FOREIGN KEY (post_id) REFERENCES forum_posts(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
            CREATE TABLE IF NOT EXISTS forum_post_collects (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                post_id VARCHAR(36) NOT NULL,
                user_id BIGINT NOT NULL,
                created_at TIMESTAMP(6) NOT NULL,
                UNIQUE KEY uk_forum_post_collects (post_id, user_id),
                FOREIGN KEY (post_id) REFERENCES forum_posts(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
            CREATE INDEX idx_forum_post_collects_user ON forum_post_collects(user_id, created_at DESC);
        "#,
    },
    Migration {
        version: 7,
        name: "create_forum_comments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS forum_comments (
                id VARCHAR(36) PRIMARY KEY,
                post_id VARCHAR(36) NOT NULL,
                author_id INTEGER NOT NULL,
                parent_id VARCHAR(36),
                content TEXT NOT NULL,
                is_anonymous BOOLEAN NOT NULL DEFAULT 0,
                like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (post_id) REFERENCES forum_posts(id),
                FOREIGN KEY (author_id) REFERENCES users(id),
                FOREIGN KEY (parent_id) REFERENCES forum_comments(id)
            );
            CREATE INDEX IF NOT EXISTS idx_forum_comments_post ON forum_comments(post_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_forum_comments_parent ON forum_comments(parent_id);
            CREATE TABLE IF NOT EXISTS forum_comment_likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                comment_id VARCHAR(36) NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (comment_id, user_id),
                FOREIGN KEY (comment_id) REFERENCES forum_comments(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS forum_comments (
                id VARCHAR(36) PRIMARY KEY,
                post_id VARCHAR(36) NOT NULL,
                author_id BIGINT NOT NULL,
                parent_id VARCHAR(36) NULL,
                content TEXT NOT NULL,
                is_anonymous BOOLEAN NOT NULL DEFAULT FALSE,
                like_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP(6) NOT NULL,
                CHECK (like_count >= 0),
                FOREIGN KEY (post_id) REFERENCES forum_posts(id),
                FOREIGN KEY (author_id) REFERENCES users(id),
                FOREIGN KEY (parent_id) REFERENCES forum_comments(id)
            );
            CREATE INDEX idx_forum_comments_post ON forum_comments(post_id, created_at);
            CREATE INDEX idx_forum_comments_parent ON forum_comments(parent_id);
            CREATE TABLE IF NOT EXISTS forum_comment_likes (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                comment_id VARCHAR(36) NOT NULL,
                user_id BIGINT NOT NULL,
                created_at TIMESTAMP(6) NOT NULL,
                UNIQUE KEY uk_forum_comment_likes (comment_id, user_id),
                FOREIGN KEY (comment_id) REFERENCES forum_comments(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
        "#,
    },
];

/// Apply every migration not yet recorded. Returns how many ran.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied: Vec<i32> = get_applied_migrations(pool)
        .await?
        .iter()
        .map(|m| m.version as i32)
        .collect();

    let mut count = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(pool.sqlite()?).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(pool.mysql()?).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get::<i32, _>("version") as i64,
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_migration_sqlite(pool.sqlite()?, migration).await,
        DatabaseDriver::Mysql => apply_migration_mysql(pool.mysql()?, migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split a migration body on `;`, dropping blank and comment-only pieces.
/// Migration SQL never contains semicolons inside string literals.
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}
