//! Database layer
//!
//! SQLite is the default backend (single file, zero setup); MySQL is
//! supported for shared deployments. Repositories receive a
//! [`DynDatabasePool`] and dispatch on its driver.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
