//! Database connection pool management.
//!
//! Connection pooling for SQLite using r2d2. Every new connection gets foreign
//! keys enabled, and migrations run once when the pool is built.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use reelcast_common::{Error, Result};

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Connections kept by a file-backed pool.
const FILE_POOL_SIZE: u32 = 4;

/// Initialize a new database pool with the given file path.
///
/// Creates the SQLite file if needed and runs pending migrations.
///
/// # Example
///
/// ```no_run
/// use reelcast_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/reelcast/catalog.db").unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    build_pool(manager, FILE_POOL_SIZE)
}

/// Initialize an in-memory database pool for testing.
///
/// Each SQLite in-memory connection is its own database, so this pool holds a
/// single connection. The data is lost when the pool is dropped.
///
/// # Example
///
/// ```
/// use reelcast_db::pool::init_memory_pool;
///
/// let pool = init_memory_pool().unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    build_pool(manager, 1)
}

fn build_pool(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("Failed to get connection for migrations: {}", e)))?;

    migrations::run_migrations(&conn)?;

    drop(conn);
    Ok(pool)
}

/// Get a connection from the pool, converting the r2d2 error.
///
/// ```
/// use reelcast_db::pool::{init_memory_pool, get_conn};
///
/// let pool = init_memory_pool().unwrap();
/// let conn = get_conn(&pool).unwrap();
/// ```
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}
