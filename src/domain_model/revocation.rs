use super::{Anchor, Subject};
use std::fmt;

/// Cache key of a revocation marker.
///
/// `{subject}@{anchor}` rejects the tokens of one session, `{subject}@*`
/// rejects every token issued at or before the stored timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RevocationKey {
    Session { subject: Subject, anchor: Anchor },
    AllSessions { subject: Subject },
}

impl RevocationKey {
    pub fn session(subject: &Subject, anchor: &Anchor) -> Self {
        RevocationKey::Session {
            subject: subject.clone(),
            anchor: anchor.clone(),
        }
    }

    pub fn all_sessions(subject: &Subject) -> Self {
        RevocationKey::AllSessions {
            subject: subject.clone(),
        }
    }
}

impl fmt::Display for RevocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevocationKey::Session { subject, anchor } => write!(f, "{}@{}", subject, anchor),
            RevocationKey::AllSessions { subject } => write!(f, "{}@*", subject),
        }
    }
}
