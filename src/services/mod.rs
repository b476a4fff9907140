//! Thin typed wrappers over the relational and file stores.

pub mod room_images;
pub mod room_service;
pub mod user_service;

pub use room_images::RoomImageService;
pub use room_service::RoomService;
pub use user_service::{NewUser, UserService};
