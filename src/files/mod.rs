pub mod base;
pub mod memory_files;
pub mod storage_files;

pub use base::{FileStore, UploadOptions};
pub use memory_files::MemoryFiles;
pub use storage_files::StorageFiles;
