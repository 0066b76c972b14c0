use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{ObjectStorage, PlatformError, PlatformResult};

/// Blobs as plain files under a directory the HTTP server exposes
/// read-only at `base_url`.
pub struct DiskStorage {
    root: PathBuf,
    base_url: String,
}

impl DiskStorage {
    pub fn new(root: PathBuf, files_url: &str) -> Self {
        Self {
            root,
            base_url: files_url.trim_end_matches('/').to_string(),
        }
    }

    /// Map an object path onto the storage directory. Only plain relative
    /// segments are accepted.
    fn resolve(&self, path: &str) -> PlatformResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !clean {
            return Err(PlatformError::Invalid(format!("Invalid object path '{}'", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for DiskStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> PlatformResult<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PlatformError::Internal(e.into()))?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true);
        if upsert {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let mut file = options.open(&target).await.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => PlatformError::Conflict("The resource already exists".into()),
            _ => PlatformError::Internal(e.into()),
        })?;
        file.write_all(&bytes)
            .await
            .map_err(|e| PlatformError::Internal(e.into()))?;
        file.flush().await.map_err(|e| PlatformError::Internal(e.into()))?;

        debug!("Stored {} ({} bytes, {})", path, bytes.len(), content_type);
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
    }

    async fn delete(&self, path: &str) -> PlatformResult<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PlatformError::NotFound),
            Err(e) => Err(PlatformError::Internal(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn storage() -> (DiskStorage, PathBuf) {
        let root = std::env::temp_dir().join(format!("picfest-storage-{}", Uuid::new_v4()));
        (DiskStorage::new(root.clone(), "http://localhost:3000/files/"), root)
    }

    #[tokio::test]
    async fn upload_serves_under_base_url() {
        let (storage, root) = storage();
        let url = storage
            .upload("eventos/abc/1-x.jpg", Bytes::from_static(b"jpeg"), "image/jpeg", false)
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/files/eventos/abc/1-x.jpg");
        assert_eq!(std::fs::read(root.join("eventos/abc/1-x.jpg")).unwrap(), b"jpeg");
        assert_eq!(storage.path_for_url(&url).as_deref(), Some("eventos/abc/1-x.jpg"));

        let again = storage
            .upload("eventos/abc/1-x.jpg", Bytes::from_static(b"more"), "image/jpeg", false)
            .await;
        assert!(matches!(again, Err(PlatformError::Conflict(_))));

        storage
            .upload("eventos/abc/1-x.jpg", Bytes::from_static(b"more"), "image/jpeg", true)
            .await
            .unwrap();
        storage.delete("eventos/abc/1-x.jpg").await.unwrap();
        assert!(matches!(
            storage.delete("eventos/abc/1-x.jpg").await,
            Err(PlatformError::NotFound)
        ));

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let (storage, _) = storage();
        let result = storage
            .upload("../etc/passwd", Bytes::from_static(b"x"), "text/plain", true)
            .await;
        assert!(matches!(result, Err(PlatformError::Invalid(_))));
        assert!(storage.path_for_url("http://elsewhere/files/a.jpg").is_none());
    }
}
