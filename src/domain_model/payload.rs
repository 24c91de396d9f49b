use super::{Anchor, Subject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Caller-supplied claims signed into an access token next to the reserved ones.
pub type CustomClaims = serde_json::Map<String, serde_json::Value>;

/// Verified content of an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedJwtPayload {
    pub sub: Subject,
    pub iat: i64,
    pub exp: i64,
    pub anc: Anchor,
    /// A string or an array of strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Value>,
    #[serde(flatten)]
    pub claims: CustomClaims,
}

impl IssuedJwtPayload {
    /// Full lifetime of the token (`exp - iat`), never below one second.
    ///
    /// Revocation markers live exactly this long: past it, every token the
    /// marker could reject has expired on its own.
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs((self.exp - self.iat).max(1) as u64)
    }
}
