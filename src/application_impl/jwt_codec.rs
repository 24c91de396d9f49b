use crate::application_port::*;
use crate::domain_model::*;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;

/// Key material used to sign and verify access tokens.
#[derive(Clone)]
pub enum Secret {
    Hmac(Vec<u8>),
    /// PEM encoded RSA, EC or Ed25519 key pair.
    KeyPair {
        private_pem: Vec<u8>,
        public_pem: Vec<u8>,
    },
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Secret::Hmac(_) => f.write_str("Secret::Hmac(..)"),
            Secret::KeyPair { .. } => f.write_str("Secret::KeyPair(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    fn of(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => KeyFamily::Hmac,
            Algorithm::ES256 | Algorithm::ES384 => KeyFamily::Ec,
            Algorithm::EdDSA => KeyFamily::Ed,
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => KeyFamily::Rsa,
        }
    }
}

/// Signs and verifies access tokens with one family of keys.
pub struct JwtCodec {
    family: KeyFamily,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtCodec {
    pub fn try_new(secret: &Secret, algorithm: Algorithm) -> Result<Self, SessionError> {
        let family = KeyFamily::of(algorithm);
        let bad_key = |e: jsonwebtoken::errors::Error| {
            SessionError::NotAllowed(format!("unusable {:?} key: {}", algorithm, e))
        };

        let (encoding_key, decoding_key) = match (secret, family) {
            (Secret::Hmac(bytes), KeyFamily::Hmac) => (
                EncodingKey::from_secret(bytes),
                DecodingKey::from_secret(bytes),
            ),
            (
                Secret::KeyPair {
                    private_pem,
                    public_pem,
                },
                family,
            ) => match family {
                KeyFamily::Rsa => (
                    EncodingKey::from_rsa_pem(private_pem).map_err(bad_key)?,
                    DecodingKey::from_rsa_pem(public_pem).map_err(bad_key)?,
                ),
                KeyFamily::Ec => (
                    EncodingKey::from_ec_pem(private_pem).map_err(bad_key)?,
                    DecodingKey::from_ec_pem(public_pem).map_err(bad_key)?,
                ),
                KeyFamily::Ed => (
                    EncodingKey::from_ed_pem(private_pem).map_err(bad_key)?,
                    DecodingKey::from_ed_pem(public_pem).map_err(bad_key)?,
                ),
                KeyFamily::Hmac => {
                    return Err(SessionError::NotAllowed(format!(
                        "{:?} needs an HMAC secret, not a key pair",
                        algorithm
                    )));
                }
            },
            (Secret::Hmac(_), _) => {
                return Err(SessionError::NotAllowed(format!(
                    "{:?} needs a key pair, not an HMAC secret",
                    algorithm
                )));
            }
        };

        Ok(Self {
            family,
            encoding_key,
            decoding_key,
        })
    }

    fn ensure_family(&self, algorithm: Algorithm) -> Result<(), SessionError> {
        if KeyFamily::of(algorithm) != self.family {
            return Err(SessionError::NotAllowed(format!(
                "algorithm {:?} does not match the configured key",
                algorithm
            )));
        }
        Ok(())
    }

    pub fn sign<T: Serialize>(&self, claims: &T, algorithm: Algorithm) -> Result<String, SessionError> {
        self.ensure_family(algorithm)?;
        encode(&Header::new(algorithm), claims, &self.encoding_key)
            .map_err(|e| SessionError::InternalError(format!("failed to sign token: {e}")))
    }

    /// Verifies signature and registered claims.
    ///
    /// A token is expired from `exp` on; leeway shifts that boundary.
    pub fn verify(
        &self,
        token: &str,
        validation: &Validation,
    ) -> Result<IssuedJwtPayload, SessionError> {
        for algorithm in &validation.algorithms {
            self.ensure_family(*algorithm)?;
        }

        let data = decode::<IssuedJwtPayload>(token, &self.decoding_key, validation)?;
        let payload = data.claims;

        let now = Utc::now().timestamp();
        if validation.validate_exp && payload.exp <= now - validation.leeway as i64 {
            return Err(SessionError::TokenExpired(ErrorKind::ExpiredSignature.into()));
        }

        Ok(payload)
    }
}
