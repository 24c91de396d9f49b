use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub jwt: Jwt,
    pub session: Session,
    pub storage: Storage,
    pub cache: Cache,
    pub cluster: Cluster,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Jwt {
    pub algorithm: String,
    /// HMAC secret; `TOKENWARD_JWT_SECRET` takes precedence when set.
    pub secret: Option<String>,
    pub private_key_path: Option<String>,
    pub public_key_path: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub leeway: u64,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub refresh_token_length: usize,
    pub refresh_token_ttl: u64,
    #[serde(default)]
    pub cap_access_ttl_to_refresh_ttl: bool,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: String, // "memory", "redis" or "mysql"
    pub dsn: Option<String>,
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    pub backend: String, // "memory" or "redis"
    pub dsn: Option<String>,
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Cluster {
    pub enabled: bool,
    pub bootstrap_server: String,
    pub topic: String,
    pub node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
