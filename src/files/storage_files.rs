use std::sync::Arc;

use async_trait::async_trait;
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use http::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::base::{FileStore, UploadOptions};
use crate::backend::client::{check_response, read_json, SupabaseClient};
use crate::error::AppError;

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key", alias = "key")]
    key: String,
}

/// Supabase Storage bucket (`/storage/v1`).
pub struct StorageFiles {
    client: Arc<SupabaseClient>,
    bucket: String,
}

impl StorageFiles {
    pub fn new(client: Arc<SupabaseClient>, bucket: &str) -> Self {
        info!("Using storage bucket '{}'", bucket);
        StorageFiles {
            client,
            bucket: bucket.to_string(),
        }
    }

    fn object_path(&self, path: &str) -> String {
        format!(
            "/storage/v1/object/{}/{}",
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl FileStore for StorageFiles {
    fn get_name(&self) -> &str {
        &self.bucket
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<String, AppError> {
        let content_type = options
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        debug!(
            bucket = self.bucket.as_str(),
            path,
            size = bytes.len(),
            "Uploading object"
        );
        let response = self
            .client
            .request(Method::POST, &self.object_path(path))
            .header(CACHE_CONTROL, format!("max-age={}", options.cache_control))
            .header("x-upsert", options.upsert.to_string())
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let uploaded: UploadResponse = read_json(check_response(response).await?).await?;
        Ok(uploaded.key)
    }

    fn get_public_url(&self, path: &str) -> String {
        self.client.url(&format!(
            "/storage/v1/object/public/{}/{}",
            self.bucket,
            path.trim_start_matches('/')
        ))
    }

    async fn remove(&self, paths: &[String]) -> Result<(), AppError> {
        let response = self
            .client
            .request(Method::DELETE, &format!("/storage/v1/object/{}", self.bucket))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn files_for(server: &Server) -> StorageFiles {
        StorageFiles::new(
            Arc::new(SupabaseClient::with_base_url(&server.url(), "anon")),
            "rooms",
        )
    }

    #[tokio::test]
    async fn upload_sends_cache_and_upsert_headers() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/storage/v1/object/rooms/room_images/7_abc.png")
            .match_header("cache-control", "max-age=3600")
            .match_header("x-upsert", "false")
            .match_header("content-type", "image/png")
            .match_body(Matcher::Exact("png-bytes".to_string()))
            .with_status(200)
            .with_body(r#"{"Key":"rooms/room_images/7_abc.png"}"#)
            .create_async()
            .await;

        let options = UploadOptions {
            content_type: Some("image/png".to_string()),
            ..UploadOptions::default()
        };
        let key = files_for(&server)
            .upload("room_images/7_abc.png", b"png-bytes".to_vec(), &options)
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(key, "rooms/room_images/7_abc.png");
    }

    #[tokio::test]
    async fn duplicate_upload_is_a_conflict() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/storage/v1/object/rooms/a.png")
            .with_status(409)
            .with_body(r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#)
            .create_async()
            .await;

        let result = files_for(&server)
            .upload("a.png", Vec::new(), &UploadOptions::default())
            .await;
        assert_eq!(
            result,
            Err(AppError::Conflict("The resource already exists".to_string()))
        );
    }

    #[tokio::test]
    async fn public_url_points_at_public_object() {
        let server = Server::new_async().await;
        let files = files_for(&server);
        assert_eq!(
            files.get_public_url("room_images/7_abc.png"),
            format!(
                "{}/storage/v1/object/public/rooms/room_images/7_abc.png",
                server.url()
            )
        );
    }

    #[tokio::test]
    async fn remove_sends_prefixes() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("DELETE", "/storage/v1/object/rooms")
            .match_body(Matcher::Json(json!({"prefixes": ["room_images/7_abc.png"]})))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        files_for(&server)
            .remove(&["room_images/7_abc.png".to_string()])
            .await
            .unwrap();
        m.assert_async().await;
    }
}
