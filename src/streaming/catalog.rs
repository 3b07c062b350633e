//! Media lookup used when creating a stream.

use async_trait::async_trait;
use reelcast_common::{Error, LibraryId, MediaId, Result};
use reelcast_db::models::{Episode, Library};
use reelcast_db::pool::{get_conn, DbPool};
use reelcast_db::queries::{episodes, libraries};

/// Read-only view of the catalog.
#[async_trait]
pub trait MediaCatalog: Send + Sync + 'static {
    async fn get_library(&self, id: LibraryId) -> Result<Option<Library>>;

    async fn get_episode(&self, id: MediaId) -> Result<Option<Episode>>;
}

/// Run a blocking query on a pooled connection off the async runtime.
async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = get_conn(&pool)?;
        f(&conn)
    })
    .await
    .map_err(|e| Error::internal(format!("catalog query panicked: {}", e)))?
}

#[async_trait]
impl MediaCatalog for DbPool {
    async fn get_library(&self, id: LibraryId) -> Result<Option<Library>> {
        with_conn(self, move |conn| libraries::get_library(conn, id)).await
    }

    async fn get_episode(&self, id: MediaId) -> Result<Option<Episode>> {
        with_conn(self, move |conn| episodes::get_episode(conn, id)).await
    }
}
