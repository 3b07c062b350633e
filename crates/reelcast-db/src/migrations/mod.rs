//! Catalog schema versioning.
//!
//! The schema version lives in SQLite's `user_version` header field. Step `n`
//! of [`STEPS`] moves the catalog from version `n` to `n + 1`; a step and its
//! version bump commit together.

use reelcast_common::{Error, Result};
use rusqlite::Connection;

const STEPS: &[&str] = &[include_str!("001_initial.sql")];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    STEPS.len() as u32
}

/// Schema version recorded in the catalog file. Zero for a fresh file.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| Error::database(format!("Failed to read schema version: {}", e)))
}

/// Bring the catalog up to [`latest_version`], returning how many steps ran.
///
/// A catalog written by a newer build is refused rather than opened.
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(Error::database(format!(
            "catalog schema version {} is newer than supported version {}",
            from, latest
        )));
    }

    for (version, sql) in STEPS.iter().enumerate().skip(from as usize) {
        let target = version as u32 + 1;
        let step_failed =
            |e: rusqlite::Error| Error::database(format!("Schema step {} failed: {}", target, e));

        let tx = conn.unchecked_transaction().map_err(step_failed)?;
        tx.execute_batch(sql).map_err(step_failed)?;
        tx.pragma_update(None, "user_version", target)
            .map_err(step_failed)?;
        tx.commit().map_err(step_failed)?;

        tracing::info!(version = target, "Upgraded catalog schema");
    }

    Ok((latest - from) as usize)
}
