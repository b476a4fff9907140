use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::base::{FileStore, UploadOptions};
use crate::error::AppError;

/// In-process bucket for offline runs and tests.
pub struct MemoryFiles {
    bucket: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFiles {
    pub fn new(bucket: &str) -> Self {
        MemoryFiles {
            bucket: bucket.to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }
}

#[async_trait]
impl FileStore for MemoryFiles {
    fn get_name(&self) -> &str {
        &self.bucket
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<String, AppError> {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        if !options.upsert && objects.contains_key(path) {
            return Err(AppError::conflict("The resource already exists"));
        }
        objects.insert(path.to_string(), bytes);
        Ok(format!("{}/{}", self.bucket, path))
    }

    fn get_public_url(&self, path: &str) -> String {
        format!("memory://{}/{}", self.bucket, path)
    }

    async fn remove(&self, paths: &[String]) -> Result<(), AppError> {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }
}
