//! Database layer
//!
//! SQLite is the default backend; MySQL is selected through
//! `database.driver`. Repositories dispatch on the pool's driver with
//! [`dispatch!`], which binds the concrete sqlx pool and runs the same query
//! body against it.

/// Run `$body` with `$conn` bound to the concrete sqlx pool behind `$pool`.
///
/// The body is expanded once per driver, so it is type-checked against both
/// `SqlitePool` and `MySqlPool`.
macro_rules! dispatch {
    ($pool:expr, |$conn:ident| $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $conn = $pool
                    .as_sqlite()
                    .ok_or_else(|| ::anyhow::anyhow!("SQLite pool unavailable"))?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $conn = $pool
                    .as_mysql()
                    .ok_or_else(|| ::anyhow::anyhow!("MySQL pool unavailable"))?;
                $body
            }
        }
    };
}

pub(crate) use dispatch;

/// Row id assigned by the last `INSERT`, whatever the backend
pub(crate) trait InsertedId {
    fn inserted_id(&self) -> i64;
}

impl InsertedId for sqlx::sqlite::SqliteQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertedId for sqlx::mysql::MySqlQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
