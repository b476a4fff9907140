pub mod base;
pub mod plain_provider;
pub mod supabase_provider;

// Re-export from base.rs so we can do "use crate::providers::*;"
pub use base::*;
pub use plain_provider::PlainProvider;
pub use supabase_provider::SupabaseProvider;
