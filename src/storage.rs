//! Result document storage.

use reqwest::{header::CONTENT_TYPE, Client, Url};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("storage rejected the upload with status {0}")]
    Rejected(u16),
    #[error("storage URL {0} cannot hold object paths")]
    InvalidUrl(String),
}

/// Somewhere result documents can be published.
#[rocket::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `bytes` at `path` and return a durable public URL for them.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, StorageError>;
}

/// A [`DocumentStore`] speaking the Supabase storage REST API.
pub struct SupabaseStorage {
    client: Client,
    base: Url,
    key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(client: Client, base: Url, key: String, bucket: String) -> Self {
        Self {
            client,
            base,
            key,
            bucket,
        }
    }

    /// The URL of an object, either the upload endpoint or its public address.
    fn object_url(&self, path: &str, public: bool) -> Result<Url, StorageError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidUrl(self.base.to_string()))?;
            segments
                .pop_if_empty()
                .extend(["storage", "v1", "object"])
                .extend(public.then_some("public"))
                .push(&self.bucket)
                .extend(path.split('/'));
        }
        Ok(url)
    }
}

#[rocket::async_trait]
impl DocumentStore for SupabaseStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let response = self
            .client
            .post(self.object_url(path, false)?)
            .bearer_auth(&self.key)
            .header("apikey", &self.key)
            .header(CONTENT_TYPE, "application/pdf")
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Rejected(status.as_u16()));
        }
        Ok(self.object_url(path, true)?.to_string())
    }
}
