use crate::domain_model::Subject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    NotAllowed,
    NotFound,
    Invalid,
    ContextMismatch,
    Expired,
    Malformed,
    Store,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("not allowed: {0}")]
    NotAllowed(String),
    #[error("Refresh token '{token}' for subject {subject} doesn't exist.")]
    NotFound { token: String, subject: Subject },
    #[error("Token '{token}' was forcibly invalidated.")]
    Invalid { token: String },
    #[error(
        "Refresh token '{token}' for subject {subject} was used from a context that differs from user session metadata."
    )]
    ContextMismatch { token: String, subject: Subject },
    #[error(transparent)]
    TokenExpired(jsonwebtoken::errors::Error),
    #[error(transparent)]
    TokenMalformed(jsonwebtoken::errors::Error),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl SessionError {
    pub fn kind(&self) -> SessionErrorKind {
        match self {
            SessionError::NotAllowed(_) => SessionErrorKind::NotAllowed,
            SessionError::NotFound { .. } => SessionErrorKind::NotFound,
            SessionError::Invalid { .. } => SessionErrorKind::Invalid,
            SessionError::ContextMismatch { .. } => SessionErrorKind::ContextMismatch,
            SessionError::TokenExpired(_) => SessionErrorKind::Expired,
            SessionError::TokenMalformed(_) => SessionErrorKind::Malformed,
            SessionError::Store(_) => SessionErrorKind::Store,
            SessionError::InternalError(_) => SessionErrorKind::Internal,
        }
    }

    /// The untouched error of the JWT primitive, for expired or malformed tokens.
    pub fn jwt_error(&self) -> Option<&jsonwebtoken::errors::Error> {
        match self {
            SessionError::TokenExpired(e) | SessionError::TokenMalformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::TokenExpired(e),
            _ => SessionError::TokenMalformed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::ErrorKind;

    #[test]
    fn jwt_errors_keep_their_kind() {
        let expired = SessionError::from(jsonwebtoken::errors::Error::from(
            ErrorKind::ExpiredSignature,
        ));
        assert_eq!(expired.kind(), SessionErrorKind::Expired);
        assert!(matches!(
            expired.jwt_error().map(|e| e.kind()),
            Some(ErrorKind::ExpiredSignature)
        ));

        let malformed =
            SessionError::from(jsonwebtoken::errors::Error::from(ErrorKind::InvalidToken));
        assert_eq!(malformed.kind(), SessionErrorKind::Malformed);
    }

    #[test]
    fn not_found_message_names_token_and_subject() {
        let e = SessionError::NotFound {
            token: "tok".to_string(),
            subject: Subject::from("bob"),
        };
        assert_eq!(
            e.to_string(),
            "Refresh token 'tok' for subject bob doesn't exist."
        );
    }
}
