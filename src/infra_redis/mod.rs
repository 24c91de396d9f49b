mod invalid_access_tokens_cache_redis;
mod refresh_tokens_storage_redis;

pub use invalid_access_tokens_cache_redis::*;
pub use refresh_tokens_storage_redis::*;
