pub mod base;
pub mod memory_store;
pub mod query;
pub mod rest_store;

// Re-export the primary store items so code outside can do
// "use crate::store::{RemoteStore, Query};"
pub use base::RemoteStore;
pub use memory_store::MemoryStore;
pub use query::{Filter, Order, Query};
pub use rest_store::RestStore;
