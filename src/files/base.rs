use async_trait::async_trait;

use crate::error::AppError;

/// Options for a single upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    /// `max-age` in seconds.
    pub cache_control: u32,
    /// Overwrite an existing object at the same path.
    pub upsert: bool,
    pub content_type: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            cache_control: 3600,
            upsert: false,
            content_type: None,
        }
    }
}

/// Object storage for one bucket.
#[async_trait]
pub trait FileStore: Send + Sync {
    fn get_name(&self) -> &str;

    /// Stores `bytes` at `path` and returns the stored object's key.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<String, AppError>;

    /// Publicly reachable URL of `path`. Does not check that the object exists.
    fn get_public_url(&self, path: &str) -> String;

    async fn remove(&self, paths: &[String]) -> Result<(), AppError>;
}
