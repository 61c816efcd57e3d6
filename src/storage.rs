//! Profile image storage behind a REST object-storage API.
//!
//! Objects are uploaded with a service key and served from a public URL.
//! Uploads must succeed before the account record is touched; deletes are
//! best effort since a stale remote object is preferable to a profile stuck
//! pointing at one we can no longer remove.

use std::{env, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use reqwest::Client;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_BUCKET: &str = "OJTSystemProfile";

/// Client for the object-storage service.
#[derive(Clone)]
pub struct ObjectStorage {
    http: Client,
    config: StorageConfig,
}

#[derive(Clone, Default)]
struct StorageConfig {
    base_url: Option<String>,
    service_key: Option<String>,
    bucket: String,
}

impl ObjectStorage {
    /// Build a client using environment variables. Missing configuration is
    /// only an error once a storage call is attempted.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("STORAGE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string());
        let service_key = env::var("STORAGE_SERVICE_KEY").ok();
        let bucket = env::var("STORAGE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());

        Ok(Self {
            http: Client::new(),
            config: StorageConfig {
                base_url,
                service_key,
                bucket,
            },
        })
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let Some(base_url) = self.config.base_url.as_deref() else {
            bail!("STORAGE_URL is not configured but required for object storage");
        };
        let Some(service_key) = self.config.service_key.as_deref() else {
            bail!("STORAGE_SERVICE_KEY is not configured but required for object storage");
        };
        Ok((base_url, service_key))
    }

    /// Upload an object, replacing any existing one at the same key.
    pub async fn upload(&self, object_path: &str, content_type: &str, bytes: Vec<u8>) -> Result<()> {
        let (base_url, service_key) = self.credentials()?;
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            base_url, self.config.bucket, object_path
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(service_key)
            .header("apikey", service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .timeout(REQUEST_TIMEOUT)
            .body(bytes)
            .send()
            .await
            .context("storage upload request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("storage upload returned {status}: {body}"));
        }

        Ok(())
    }

    /// Delete an object. Callers are expected to tolerate failure.
    pub async fn delete(&self, object_path: &str) -> Result<()> {
        let (base_url, service_key) = self.credentials()?;
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            base_url, self.config.bucket, object_path
        );

        let response = self
            .http
            .delete(&url)
            .bearer_auth(service_key)
            .header("apikey", service_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("storage delete request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("storage delete returned {status}"));
        }

        Ok(())
    }

    /// Public URL an uploaded object is served from.
    pub fn public_url(&self, object_path: &str) -> String {
        let base_url = self.config.base_url.as_deref().unwrap_or_default();
        format!(
            "{}/storage/v1/object/public/{}/{}",
            base_url, self.config.bucket, object_path
        )
    }

    /// Extract the object key from one of our own public URLs. Returns None
    /// for foreign or malformed URLs, which callers skip deleting.
    pub fn object_path_from_public_url(&self, public_url: &str) -> Option<String> {
        let base_url = self.config.base_url.as_deref()?;
        let prefix = format!(
            "{}/storage/v1/object/public/{}/",
            base_url, self.config.bucket
        );
        public_url
            .strip_prefix(&prefix)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> ObjectStorage {
        ObjectStorage {
            http: Client::new(),
            config: StorageConfig {
                base_url: Some("https://storage.example.com".to_string()),
                service_key: Some("key".to_string()),
                bucket: "OJTSystemProfile".to_string(),
            },
        }
    }

    #[test]
    fn public_url_round_trips_to_object_path() {
        let storage = test_storage();
        let path = "staff/instructor/8c2f/abcd1234.png";
        let url = storage.public_url(path);
        assert_eq!(storage.object_path_from_public_url(&url).as_deref(), Some(path));
    }

    #[test]
    fn foreign_urls_are_rejected() {
        let storage = test_storage();
        assert!(storage
            .object_path_from_public_url("https://elsewhere.example.com/storage/v1/object/public/OJTSystemProfile/x.png")
            .is_none());
        assert!(storage
            .object_path_from_public_url("https://storage.example.com/storage/v1/object/public/OtherBucket/x.png")
            .is_none());
    }
}
