use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier a session belongs to; carried as the `sub` claim.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(pub String);

impl Subject {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(s: &str) -> Self {
        Subject(s.to_owned())
    }
}

impl From<String> for Subject {
    fn from(s: String) -> Self {
        Subject(s)
    }
}
