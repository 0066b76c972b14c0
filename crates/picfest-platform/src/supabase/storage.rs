use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};

use super::SupabaseClient;
use crate::{ObjectStorage, PlatformError, PlatformResult};

/// One public bucket of the project's object storage.
pub struct SupabaseStorage {
    client: Arc<SupabaseClient>,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(client: Arc<SupabaseClient>, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}/", self.client.base_url(), self.bucket)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> PlatformResult<String> {
        let resp = self
            .client
            .request(
                Method::POST,
                &format!("/storage/v1/object/{}/{}", self.bucket, path),
            )
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;
        SupabaseClient::ensure_success(resp, "upload object").await?;
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.public_prefix(), path.trim_start_matches('/'))
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_prefix())
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
    }

    async fn delete(&self, path: &str) -> PlatformResult<()> {
        let removed: Vec<Value> = SupabaseClient::json(
            self.client
                .request(Method::DELETE, &format!("/storage/v1/object/{}", self.bucket))
                .json(&json!({ "prefixes": [path] })),
            "remove object",
        )
        .await?;
        if removed.is_empty() {
            return Err(PlatformError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_urls_round_trip_to_paths() {
        let client = Arc::new(SupabaseClient::new("https://abc.supabase.co/", "key".into()));
        let storage = SupabaseStorage::new(client, "midias");

        let url = storage.public_url("eventos/e1/1-x.jpg");
        assert_eq!(
            url,
            "https://abc.supabase.co/storage/v1/object/public/midias/eventos/e1/1-x.jpg"
        );
        assert_eq!(storage.path_for_url(&url).as_deref(), Some("eventos/e1/1-x.jpg"));
        assert!(storage.path_for_url("https://picsum.photos/800/600").is_none());
    }
}
