use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading refresh-token characters embedded in access tokens.
pub const ANCHOR_LENGTH: usize = 5;

/// Shortest refresh token the strategy agrees to mint.
pub const MIN_REFRESH_TOKEN_LENGTH: usize = 20;

/// Fixed-length prefix of a refresh token. Access tokens carry it as `anc`
/// so a revocation can target every token derived from one refresh token
/// without the JWT ever holding the refresh token itself.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Anchor(pub String);

impl Anchor {
    pub fn of(refresh_token: &str) -> Self {
        Anchor(refresh_token.chars().take(ANCHOR_LENGTH).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorableRefreshToken {
    pub token: String,
    pub anchor: Anchor,
}

impl AnchorableRefreshToken {
    pub fn new(token: String) -> Self {
        let anchor = Anchor::of(&token);
        Self { token, anchor }
    }
}
