use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::files::{FileStore, UploadOptions};
use crate::models::Row;
use crate::store::{Query, RemoteStore};

const ROOMS: &str = "rooms";
const IMAGE_DIR: &str = "room_images";

/// Room photos: object storage plus the `image_url` column on `rooms`.
#[derive(Clone)]
pub struct RoomImageService {
    store: Arc<dyn RemoteStore>,
    files: Arc<dyn FileStore>,
}

impl RoomImageService {
    pub fn new(store: Arc<dyn RemoteStore>, files: Arc<dyn FileStore>) -> Self {
        RoomImageService { store, files }
    }

    async fn set_image_url(&self, room_id: i64, url: Value) -> Result<(), AppError> {
        self.store
            .update(
                &Query::table(ROOMS).eq("room_id", room_id),
                Row::from_iter([("image_url".to_string(), url)]),
            )
            .await?;
        Ok(())
    }

    /// Uploads under a unique name and records the public URL on the room.
    pub async fn upload_room_image(
        &self,
        room_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String, AppError> {
        let ext = file_name.rsplit('.').next().unwrap_or(file_name);
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(13).collect();
        let path = format!("{}/{}_{}.{}", IMAGE_DIR, room_id, suffix, ext);

        let options = UploadOptions {
            cache_control: 3600,
            upsert: false,
            content_type: content_type.map(str::to_string),
        };
        let result = async {
            self.files.upload(&path, bytes, &options).await?;
            let url = self.files.get_public_url(&path);
            self.set_image_url(room_id, json!(url)).await?;
            Ok::<_, AppError>(url)
        }
        .await;

        match &result {
            Ok(url) => info!(
                event_name = "rooms.image.uploaded",
                event_domain = "roomboard",
                room_id,
                url = url.as_str(),
                "Room image uploaded"
            ),
            Err(e) => error!(room_id, error = %e, "Error uploading room image"),
        }
        result
    }

    pub async fn get_room_image(&self, room_id: i64) -> Result<Option<String>, AppError> {
        let row = self
            .store
            .select_one(&Query::table(ROOMS).select("image_url").eq("room_id", room_id))
            .await
            .map_err(|e| {
                error!(room_id, error = %e, "Error getting room image");
                e
            })?;
        Ok(row
            .get("image_url")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Removes the stored object named by the URL's last path segment and clears the room's URL.
    pub async fn delete_room_image(&self, image_url: &str, room_id: i64) -> Result<(), AppError> {
        let without_query = image_url.split(['?', '#']).next().unwrap_or(image_url);
        let file_name = without_query
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::validation(format!("Invalid image URL: {}", image_url)))?;
        let path = format!("{}/{}", IMAGE_DIR, file_name);

        let result = async {
            self.files.remove(&[path.clone()]).await?;
            self.set_image_url(room_id, Value::Null).await
        }
        .await;
        if let Err(e) = &result {
            error!(room_id, path = path.as_str(), error = %e, "Error deleting room image");
        }
        result
    }
}
