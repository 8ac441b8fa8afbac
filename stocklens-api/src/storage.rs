/// Photo storage
///
/// Confirmed analyses may carry the original shelf photo. Uploads are best
/// effort: a failed upload is logged and the inventory records are saved
/// without a photo URL, matching the save path's tolerance for missing
/// photos.
///
/// The production store speaks the Supabase-storage HTTP API, but any
/// object store with a `POST {url}/storage/v1/object/{bucket}/{name}`
/// surface works.

use crate::config::StorageConfig;
use async_trait::async_trait;
use uuid::Uuid;

/// Photo store contract
///
/// `upload` never fails the caller. Implementations return `Some(url)`
/// with a publicly reachable URL, or `None` when the photo could not be
/// stored.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Uploads JPEG bytes, returning the public URL on success
    async fn upload(&self, bytes: &[u8]) -> Option<String>;
}

/// Object-store-backed photo store
pub struct BucketStore {
    http: reqwest::Client,
    config: StorageConfig,
}

impl BucketStore {
    /// Creates a store from storage configuration
    pub fn new(config: StorageConfig) -> Self {
        BucketStore {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn object_name() -> String {
        format!("{}.jpg", Uuid::new_v4())
    }

    fn upload_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url, self.config.bucket, name
        )
    }

    fn public_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url, self.config.bucket, name
        )
    }
}

#[async_trait]
impl PhotoStore for BucketStore {
    async fn upload(&self, bytes: &[u8]) -> Option<String> {
        let name = Self::object_name();

        let result = self
            .http
            .post(self.upload_url(&name))
            .bearer_auth(&self.config.service_key)
            .header("Content-Type", "image/jpeg")
            .body(bytes.to_vec())
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(object = %name, "Uploaded inventory photo");
                Some(self.public_url(&name))
            }
            Ok(response) => {
                tracing::warn!(
                    object = %name,
                    status = %response.status(),
                    "Photo upload rejected, saving records without photo"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    object = %name,
                    error = %e,
                    "Photo upload failed, saving records without photo"
                );
                None
            }
        }
    }
}

/// Store used when no storage backend is configured
///
/// Records are saved without photo URLs.
pub struct DisabledStore;

#[async_trait]
impl PhotoStore for DisabledStore {
    async fn upload(&self, _bytes: &[u8]) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_store_returns_none() {
        let store = DisabledStore;
        assert_eq!(store.upload(&[1, 2, 3]).await, None);
    }

    #[test]
    fn test_bucket_urls() {
        let store = BucketStore::new(StorageConfig {
            url: "https://example.supabase.co".to_string(),
            bucket: "inventory-photos".to_string(),
            service_key: "key".to_string(),
        });

        assert_eq!(
            store.upload_url("abc.jpg"),
            "https://example.supabase.co/storage/v1/object/inventory-photos/abc.jpg"
        );
        assert_eq!(
            store.public_url("abc.jpg"),
            "https://example.supabase.co/storage/v1/object/public/inventory-photos/abc.jpg"
        );
    }

    #[test]
    fn test_object_names_are_unique_jpgs() {
        let a = BucketStore::object_name();
        let b = BucketStore::object_name();
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);
    }
}
