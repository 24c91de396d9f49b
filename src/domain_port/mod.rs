mod invalid_access_tokens_cache;
mod refresh_tokens_storage;

pub use invalid_access_tokens_cache::*;
pub use refresh_tokens_storage::*;
