//! Episode database queries.
//!
//! An episode row keeps the probe result of its file as a JSON document so the
//! session manager can compute a duration and pick tracks without touching disk.

use chrono::Utc;
use reelcast_common::{Error, LibraryId, MediaId, Result};
use rusqlite::{Connection, Row};

use super::{json_column, timestamp_column, uuid_column};
use crate::models::{Episode, MediaInfo};

const EPISODE_COLUMNS: &str = "id, library_id, name, file_path, info, created_at";

fn row_to_episode(row: &Row<'_>) -> rusqlite::Result<Episode> {
    Ok(Episode {
        id: MediaId::from(uuid_column(row.get(0)?, 0)?),
        library_id: LibraryId::from(uuid_column(row.get(1)?, 1)?),
        name: row.get(2)?,
        file_path: row.get(3)?,
        info: json_column(row.get(4)?, 4)?,
        created_at: timestamp_column(row.get(5)?, 5)?,
    })
}

/// Create a new episode in a library.
///
/// Fails with `NotFound` if the library does not exist.
pub fn create_episode(
    conn: &Connection,
    library_id: LibraryId,
    name: &str,
    file_path: &str,
    info: &MediaInfo,
) -> Result<Episode> {
    let id = MediaId::new();
    let created_at = Utc::now();
    let info_json = serde_json::to_string(info)?;

    conn.execute(
        "INSERT INTO episodes (id, library_id, name, file_path, info, created_at)
         VALUES (:id, :library_id, :name, :file_path, :info, :created_at)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":library_id": library_id.to_string(),
            ":name": name,
            ":file_path": file_path,
            ":info": info_json,
            ":created_at": created_at.to_rfc3339(),
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Error::not_found(format!("library {}", library_id))
        }
        other => Error::database(other.to_string()),
    })?;

    Ok(Episode {
        id,
        library_id,
        name: name.to_string(),
        file_path: file_path.to_string(),
        info: info.clone(),
        created_at,
    })
}

/// Get an episode by ID. Returns `Ok(None)` when it does not exist.
pub fn get_episode(conn: &Connection, id: MediaId) -> Result<Option<Episode>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM episodes WHERE id = :id", EPISODE_COLUMNS),
        rusqlite::named_params! { ":id": id.to_string() },
        row_to_episode,
    );

    match result {
        Ok(episode) => Ok(Some(episode)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List the episodes of a library ordered by name.
pub fn list_episodes(conn: &Connection, library_id: LibraryId) -> Result<Vec<Episode>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM episodes WHERE library_id = :library_id ORDER BY name",
            EPISODE_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let episodes = stmt
        .query_map(
            rusqlite::named_params! { ":library_id": library_id.to_string() },
            row_to_episode,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(episodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Track;
    use crate::pool::{get_conn, init_memory_pool};
    use crate::queries::libraries;
    use reelcast_common::{LibraryKind, TrackKind};

    fn sample_info() -> MediaInfo {
        MediaInfo {
            container_duration: Some(1325.4),
            tracks: vec![
                Track {
                    index: 0,
                    kind: TrackKind::Video,
                    codec: Some("h264".to_string()),
                    language: None,
                    duration: None,
                },
                Track {
                    index: 1,
                    kind: TrackKind::Audio,
                    codec: Some("aac".to_string()),
                    language: Some("jpn".to_string()),
                    duration: Some(1325.0),
                },
            ],
        }
    }

    #[test]
    fn test_create_and_get_episode() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let library = libraries::create_library(&conn, "Shows", LibraryKind::Show, &[]).unwrap();

        let episode =
            create_episode(&conn, library.id, "Pilot", "/shows/pilot.mkv", &sample_info())
                .unwrap();

        let fetched = get_episode(&conn, episode.id).unwrap().unwrap();
        assert_eq!(fetched.library_id, library.id);
        assert_eq!(fetched.file_path, "/shows/pilot.mkv");
        assert_eq!(fetched.info, sample_info());
        assert_eq!(fetched.info.duration_secs(), Some(1325.4));
    }

    #[test]
    fn test_get_missing_episode() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        assert!(get_episode(&conn, MediaId::new()).unwrap().is_none());
    }

    #[test]
    fn test_create_episode_unknown_library() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let err = create_episode(
            &conn,
            LibraryId::new(),
            "Orphan",
            "/x.mkv",
            &MediaInfo::default(),
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_episodes_scoped_to_library() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let a = libraries::create_library(&conn, "A", LibraryKind::Show, &[]).unwrap();
        let b = libraries::create_library(&conn, "B", LibraryKind::Show, &[]).unwrap();

        create_episode(&conn, a.id, "E02", "/a/2.mkv", &MediaInfo::default()).unwrap();
        create_episode(&conn, a.id, "E01", "/a/1.mkv", &MediaInfo::default()).unwrap();
        create_episode(&conn, b.id, "E01", "/b/1.mkv", &MediaInfo::default()).unwrap();

        let names: Vec<String> = list_episodes(&conn, a.id)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["E01", "E02"]);
    }

    #[test]
    fn test_deleting_library_cascades() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let library = libraries::create_library(&conn, "A", LibraryKind::Show, &[]).unwrap();
        let episode =
            create_episode(&conn, library.id, "E01", "/a/1.mkv", &MediaInfo::default()).unwrap();

        libraries::delete_library(&conn, library.id).unwrap();
        assert!(get_episode(&conn, episode.id).unwrap().is_none());
    }
}
