mod invalid_access_tokens_cache_memory;
mod refresh_tokens_storage_memory;

pub use invalid_access_tokens_cache_memory::*;
pub use refresh_tokens_storage_memory::*;
