//! Library database queries.

use chrono::Utc;
use reelcast_common::{Error, LibraryId, LibraryKind, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use super::{json_column, timestamp_column, uuid_column};
use crate::models::Library;

const LIBRARY_COLUMNS: &str = "id, name, kind, paths, created_at";

fn row_to_library(row: &Row<'_>) -> rusqlite::Result<Library> {
    let kind: String = row.get(2)?;
    let kind = kind.parse::<LibraryKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into())
    })?;

    Ok(Library {
        id: LibraryId::from(uuid_column(row.get(0)?, 0)?),
        name: row.get(1)?,
        kind,
        paths: json_column(row.get(3)?, 3)?,
        created_at: timestamp_column(row.get(4)?, 4)?,
    })
}

/// Create a new library.
pub fn create_library(
    conn: &Connection,
    name: &str,
    kind: LibraryKind,
    paths: &[String],
) -> Result<Library> {
    let id = LibraryId::new();
    let created_at = Utc::now();
    let paths_json = serde_json::to_string(paths)?;

    conn.execute(
        "INSERT INTO libraries (id, name, kind, paths, created_at)
         VALUES (:id, :name, :kind, :paths, :created_at)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":name": name,
            ":kind": kind.to_string(),
            ":paths": paths_json,
            ":created_at": created_at.to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Library {
        id,
        name: name.to_string(),
        kind,
        paths: paths.to_vec(),
        created_at,
    })
}

/// Get a library by ID. Returns `Ok(None)` when it does not exist.
pub fn get_library(conn: &Connection, id: LibraryId) -> Result<Option<Library>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM libraries WHERE id = :id", LIBRARY_COLUMNS),
        rusqlite::named_params! { ":id": id.to_string() },
        row_to_library,
    );

    match result {
        Ok(library) => Ok(Some(library)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all libraries ordered by name.
pub fn list_libraries(conn: &Connection) -> Result<Vec<Library>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM libraries ORDER BY name",
            LIBRARY_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let libraries = stmt
        .query_map([], row_to_library)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(libraries)
}

/// Delete a library (cascades to episodes).
///
/// Returns `true` if a library was deleted.
pub fn delete_library(conn: &Connection, id: LibraryId) -> Result<bool> {
    let rows_affected = conn
        .execute(
            "DELETE FROM libraries WHERE id = :id",
            rusqlite::named_params! { ":id": id.to_string() },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};

    #[test]
    fn test_create_and_get_library() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let paths = vec!["/media/shows".to_string()];
        let library = create_library(&conn, "Shows", LibraryKind::Show, &paths).unwrap();

        let fetched = get_library(&conn, library.id).unwrap().unwrap();
        assert_eq!(fetched.id, library.id);
        assert_eq!(fetched.name, "Shows");
        assert_eq!(fetched.kind, LibraryKind::Show);
        assert_eq!(fetched.paths, paths);
    }

    #[test]
    fn test_get_missing_library() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        assert!(get_library(&conn, LibraryId::new()).unwrap().is_none());
    }

    #[test]
    fn test_list_libraries_sorted() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        create_library(&conn, "Zeta", LibraryKind::File, &[]).unwrap();
        create_library(&conn, "Alpha", LibraryKind::Show, &[]).unwrap();

        let names: Vec<String> = list_libraries(&conn)
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_delete_library() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let library = create_library(&conn, "Files", LibraryKind::File, &[]).unwrap();
        assert!(delete_library(&conn, library.id).unwrap());
        assert!(!delete_library(&conn, library.id).unwrap());
        assert!(get_library(&conn, library.id).unwrap().is_none());
    }
}
