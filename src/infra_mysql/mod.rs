mod refresh_tokens_storage_mysql;

pub use refresh_tokens_storage_mysql::*;
