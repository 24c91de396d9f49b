use super::{JwtCodec, Secret};
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, Validation};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SignDefaults {
    pub algorithm: Algorithm,
    pub expires_in: Duration,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl Default for SignDefaults {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::HS256,
            expires_in: Duration::from_secs(15 * 60), // 15 minutes
            issuer: None,
            audience: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifyDefaults {
    pub algorithms: Vec<Algorithm>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway: u64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret,
    pub sign: SignDefaults,
    pub verify: VerifyDefaults,
    /// Never hand out an access token outliving its refresh token.
    pub cap_access_ttl_to_refresh_ttl: bool,
}

impl JwtConfig {
    /// Verification defaults mirror the signing defaults.
    pub fn new(secret: Secret, sign: SignDefaults) -> Self {
        let verify = VerifyDefaults {
            algorithms: vec![sign.algorithm],
            issuer: sign.issuer.clone(),
            audience: sign.audience.clone(),
            leeway: 0,
        };
        Self {
            secret,
            sign,
            verify,
            cap_access_ttl_to_refresh_ttl: false,
        }
    }

    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.verify.leeway = leeway;
        self
    }

    pub fn with_access_ttl_cap(mut self, cap: bool) -> Self {
        self.cap_access_ttl_to_refresh_ttl = cap;
        self
    }
}

struct ResolvedSignOptions {
    subject: Subject,
    algorithm: Algorithm,
    expires_in: Duration,
    issuer: Option<String>,
    audience: Option<String>,
}

impl SignDefaults {
    fn resolve(&self, options: SignOptions) -> ResolvedSignOptions {
        ResolvedSignOptions {
            subject: options.subject,
            algorithm: options.algorithm.unwrap_or(self.algorithm),
            expires_in: options.expires_in.unwrap_or(self.expires_in),
            issuer: options.issuer.or_else(|| self.issuer.clone()),
            audience: options.audience.or_else(|| self.audience.clone()),
        }
    }
}

impl VerifyDefaults {
    fn resolve(&self, options: Option<VerifyOptions>) -> Validation {
        let options = options.unwrap_or_default();
        let algorithms = options
            .algorithms
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| self.algorithms.clone());

        let mut validation = Validation::new(algorithms[0]);
        validation.algorithms = algorithms;
        validation.leeway = options.leeway.unwrap_or(self.leeway);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        if let Some(issuer) = options.issuer.or_else(|| self.issuer.clone()) {
            validation.set_issuer(&[issuer]);
        }
        match options.audience.or_else(|| self.audience.clone()) {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

/// Public session façade: owns JWT signing and verification and defers
/// every lifecycle decision to the invalidation strategy.
pub struct JwtSessionManager {
    codec: JwtCodec,
    config: JwtConfig,
    strategy: Arc<dyn InvalidationStrategy>,
    events: Arc<dyn SessionEventSink>,
}

impl JwtSessionManager {
    pub fn try_new(
        config: JwtConfig,
        strategy: Arc<dyn InvalidationStrategy>,
        events: Arc<dyn SessionEventSink>,
    ) -> Result<Self, SessionError> {
        if config.verify.algorithms.is_empty() {
            return Err(SessionError::NotAllowed(
                "at least one verification algorithm is required".to_string(),
            ));
        }
        let codec = JwtCodec::try_new(&config.secret, config.sign.algorithm)?;

        Ok(Self {
            codec,
            config,
            strategy,
            events,
        })
    }

    fn sign(
        &self,
        payload: CustomClaims,
        options: &ResolvedSignOptions,
        anchor: &Anchor,
    ) -> Result<(AccessToken, DateTime<Utc>), SessionError> {
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + options.expires_in;

        let mut claims = payload;
        claims.insert("sub".into(), Value::from(options.subject.as_str()));
        claims.insert("iat".into(), Value::from(iat_dt.timestamp()));
        claims.insert("exp".into(), Value::from(exp_dt.timestamp()));
        claims.insert("anc".into(), Value::from(anchor.as_str()));
        if let Some(issuer) = &options.issuer {
            claims.insert("iss".into(), Value::from(issuer.as_str()));
        }
        if let Some(audience) = &options.audience {
            claims.insert("aud".into(), Value::from(audience.as_str()));
        }

        let token = self.codec.sign(&claims, options.algorithm)?;
        Ok((AccessToken(token), exp_dt))
    }

    fn capped(
        &self,
        mut options: ResolvedSignOptions,
        refresh_expires_at: DateTime<Utc>,
    ) -> ResolvedSignOptions {
        if self.config.cap_access_ttl_to_refresh_ttl {
            let remaining = (refresh_expires_at - Utc::now()).num_seconds().max(0) as u64;
            options.expires_in = options.expires_in.min(Duration::from_secs(remaining));
        }
        options
    }
}

#[async_trait::async_trait]
impl SessionService for JwtSessionManager {
    async fn create(
        &self,
        payload: CustomClaims,
        options: SignOptions,
        context: UserSessionOperationContext,
    ) -> Result<SessionTokens, SessionError> {
        let options = self.config.sign.resolve(options);

        let refresh_token = self
            .strategy
            .generate_refresh_token(&options.subject, &context)
            .await?;
        let (access_token, access_exp) = self.sign(payload, &options, &refresh_token.anchor)?;

        info!(subject = %options.subject, anchor = %refresh_token.anchor, "session created");

        Ok(SessionTokens {
            access_token,
            refresh_token: RefreshToken(refresh_token.token),
            access_token_expires_at: access_exp,
        })
    }

    async fn read(
        &self,
        access_token: &str,
        options: Option<VerifyOptions>,
    ) -> Result<IssuedJwtPayload, SessionError> {
        let validation = self.config.verify.resolve(options);
        let payload = self.codec.verify(access_token, &validation)?;

        if !self.strategy.is_access_token_still_valid(&payload).await? {
            debug!(subject = %payload.sub, anchor = %payload.anc, "rejected revoked access token");
            return Err(SessionError::Invalid {
                token: access_token.to_owned(),
            });
        }

        Ok(payload)
    }

    async fn update(
        &self,
        refresh_token: &str,
        payload: CustomClaims,
        options: SignOptions,
        context: UserSessionOperationContext,
    ) -> Result<AccessToken, SessionError> {
        let options = self.config.sign.resolve(options);

        let refreshed = match self
            .strategy
            .refresh_session(&options.subject, refresh_token, &context)
            .await
        {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!(subject = %options.subject, kind = ?e.kind(), "refresh refused");
                return Err(e);
            }
        };

        let options = self.capped(options, refreshed.refresh_token_expires_at);
        let (access_token, _) = self.sign(payload, &options, &refreshed.anchor)?;

        debug!(subject = %options.subject, anchor = %refreshed.anchor, "session refreshed");
        Ok(access_token)
    }

    async fn delete_one(
        &self,
        subject: &Subject,
        refresh_token: &str,
        payload: &IssuedJwtPayload,
    ) -> Result<(), SessionError> {
        self.strategy
            .invalidate_session(subject, refresh_token, payload)
            .await?;

        info!(subject = %subject, anchor = %payload.anc, "session invalidated");
        self.events.emit(JwtManagerEvent::SessionInvalidated {
            payload: payload.clone(),
        });
        Ok(())
    }

    async fn delete_all(
        &self,
        subject: &Subject,
        payload: &IssuedJwtPayload,
    ) -> Result<u64, SessionError> {
        let (count, ttl) = self
            .strategy
            .invalidate_all_sessions(subject, payload)
            .await?;

        info!(subject = %subject, count, "all sessions invalidated");
        self.events.emit(JwtManagerEvent::AllSessionsInvalidated {
            subject: subject.clone(),
            access_token_ttl: ttl.as_secs(),
        });
        Ok(count)
    }

    async fn restrict_one(&self, payload: &IssuedJwtPayload) -> Result<(), SessionError> {
        debug!(subject = %payload.sub, anchor = %payload.anc, "restricting access token");
        self.strategy.restrict_access_token(payload).await
    }

    async fn restrict_all(
        &self,
        subject: &Subject,
        access_token_ttl: Duration,
    ) -> Result<(), SessionError> {
        debug!(subject = %subject, ttl = access_token_ttl.as_secs(), "restricting all access tokens");
        self.strategy
            .restrict_all_access_tokens(subject, access_token_ttl)
            .await
    }

    async fn read_all(
        &self,
        subject: &Subject,
    ) -> Result<BTreeMap<String, QueriedUserSessionMetaData>, SessionError> {
        self.strategy.list_active_sessions(subject).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> SignDefaults {
        SignDefaults {
            algorithm: Algorithm::HS256,
            expires_in: Duration::from_secs(60),
            issuer: Some("tokenward".to_string()),
            audience: Some("web".to_string()),
        }
    }

    #[test]
    fn sign_options_override_defaults() {
        let resolved = defaults().resolve(
            SignOptions::new("alice")
                .expires_in(Duration::from_secs(5))
                .audience("mobile"),
        );
        assert_eq!(resolved.subject.as_str(), "alice");
        assert_eq!(resolved.expires_in, Duration::from_secs(5));
        assert_eq!(resolved.issuer.as_deref(), Some("tokenward"));
        assert_eq!(resolved.audience.as_deref(), Some("mobile"));
        assert_eq!(resolved.algorithm, Algorithm::HS256);
    }

    #[test]
    fn verify_defaults_follow_sign_defaults() {
        let config = JwtConfig::new(Secret::Hmac(b"k".to_vec()), defaults());
        let validation = config.verify.resolve(None);
        assert_eq!(validation.algorithms, vec![Algorithm::HS256]);
        assert_eq!(validation.leeway, 0);
        assert!(validation.validate_aud);

        let validation = VerifyDefaults {
            audience: None,
            ..config.verify.clone()
        }
        .resolve(Some(VerifyOptions {
            leeway: Some(30),
            ..VerifyOptions::default()
        }));
        assert_eq!(validation.leeway, 30);
        assert!(!validation.validate_aud);
    }
}
