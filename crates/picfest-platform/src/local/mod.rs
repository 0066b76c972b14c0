//! Offline binding: SQLite rows, files on disk and an in-process change
//! feed. Lets the whole application run without a hosted project.

pub mod auth;
pub mod dispatcher;
pub mod storage;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use picfest_db::Database;

use crate::{Platform, PlatformError, PlatformResult};

pub use auth::LocalAuth;
pub use dispatcher::Dispatcher;
pub use storage::DiskStorage;
pub use store::LocalStore;

/// Run a database call on the blocking pool.
pub(crate) async fn blocking<F, T>(db: &Arc<Database>, f: F) -> PlatformResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await?
        .map_err(PlatformError::from_db)
}

/// Wire the local pieces together. `files_url` is the public base under
/// which the storage directory is served.
pub fn platform(
    db: Arc<Database>,
    jwt_secret: String,
    storage_dir: PathBuf,
    files_url: &str,
) -> Platform {
    let dispatcher = Dispatcher::new();
    Platform {
        auth: Arc::new(LocalAuth::new(db.clone(), jwt_secret)),
        store: Arc::new(LocalStore::new(db, dispatcher.clone())),
        storage: Arc::new(DiskStorage::new(storage_dir, files_url)),
        feed: Arc::new(dispatcher),
    }
}
