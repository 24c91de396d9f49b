use super::SessionError;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::Algorithm;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
}

/// Per-call signing options. Unset fields fall back to the manager defaults.
#[derive(Debug, Clone)]
pub struct SignOptions {
    pub subject: Subject,
    pub algorithm: Option<Algorithm>,
    pub expires_in: Option<Duration>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl SignOptions {
    pub fn new(subject: impl Into<Subject>) -> Self {
        Self {
            subject: subject.into(),
            algorithm: None,
            expires_in: None,
            issuer: None,
            audience: None,
        }
    }

    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub algorithms: Option<Vec<Algorithm>>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway: Option<u64>,
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    async fn create(
        &self,
        payload: CustomClaims,
        options: SignOptions,
        context: UserSessionOperationContext,
    ) -> Result<SessionTokens, SessionError>;

    async fn read(
        &self,
        access_token: &str,
        options: Option<VerifyOptions>,
    ) -> Result<IssuedJwtPayload, SessionError>;

    async fn update(
        &self,
        refresh_token: &str,
        payload: CustomClaims,
        options: SignOptions,
        context: UserSessionOperationContext,
    ) -> Result<AccessToken, SessionError>;

    async fn delete_one(
        &self,
        subject: &Subject,
        refresh_token: &str,
        payload: &IssuedJwtPayload,
    ) -> Result<(), SessionError>;

    async fn delete_all(
        &self,
        subject: &Subject,
        payload: &IssuedJwtPayload,
    ) -> Result<u64, SessionError>;

    async fn restrict_one(&self, payload: &IssuedJwtPayload) -> Result<(), SessionError>;

    async fn restrict_all(
        &self,
        subject: &Subject,
        access_token_ttl: Duration,
    ) -> Result<(), SessionError>;

    async fn read_all(
        &self,
        subject: &Subject,
    ) -> Result<BTreeMap<String, QueriedUserSessionMetaData>, SessionError>;
}
