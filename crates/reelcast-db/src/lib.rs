//! Reelcast-DB: Catalog schema, migrations, and query operations
//!
//! This crate stores the libraries and episodes a stream can be created from,
//! using SQLite with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Schema versioning through SQLite's `user_version`
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use reelcast_common::LibraryKind;
//! use reelcast_db::pool::{init_pool, get_conn};
//! use reelcast_db::queries::libraries;
//!
//! let pool = init_pool("/var/lib/reelcast/catalog.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let library = libraries::create_library(&conn, "Shows", LibraryKind::Show, &[]).unwrap();
//! println!("Created library: {}", library.name);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
