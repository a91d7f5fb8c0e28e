use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::services::auth::clock::{Clock, SystemClock};
use crate::services::auth::error::AuthError;
use crate::services::identity::types::{Identity, Role};

/// Errors raised while loading key material (startup only).
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("empty secret for key '{0}'")]
    EmptySecret(String),
    #[error("invalid ed25519 pem for key '{kid}': {source}")]
    InvalidPem {
        kid: String,
        source: jsonwebtoken::errors::Error,
    },
    #[error("duplicate key id '{0}'")]
    DuplicateKid(String),
}

struct SigningKey {
    kid: String,
    algorithm: Algorithm,
    key: EncodingKey,
}

struct VerificationKey {
    kid: String,
    algorithm: Algorithm,
    key: DecodingKey,
    validation: Validation,
}

impl VerificationKey {
    fn new(kid: String, algorithm: Algorithm, key: DecodingKey) -> Self {
        // Claims are checked by the codec; this only verifies the MAC/signature.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            kid,
            algorithm,
            key,
            validation,
        }
    }
}

/// One active signing key plus every key still accepted for verification.
///
/// The signing key is always part of the verification set. Retired keys stay
/// in the set until tokens they signed have expired.
pub struct KeySet {
    signing: SigningKey,
    verification: Vec<VerificationKey>,
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        let kids: Vec<&str> = self.verification.iter().map(|k| k.kid.as_str()).collect();
        f.debug_struct("KeySet")
            .field("signing_kid", &self.signing.kid)
            .field("algorithm", &self.signing.algorithm)
            .field("verification_kids", &kids)
            .finish()
    }
}

impl KeySet {
    /// HS256 shared-secret key set.
    pub fn hs256(kid: impl Into<String>, secret: &[u8]) -> Result<Self, KeyError> {
        let kid = kid.into();
        if secret.is_empty() {
            return Err(KeyError::EmptySecret(kid));
        }

        Ok(Self {
            signing: SigningKey {
                kid: kid.clone(),
                algorithm: Algorithm::HS256,
                key: EncodingKey::from_secret(secret),
            },
            verification: vec![VerificationKey::new(
                kid,
                Algorithm::HS256,
                DecodingKey::from_secret(secret),
            )],
        })
    }

    /// EdDSA key set. `private_key_pem` must be an Ed25519 PKCS#8 PEM.
    pub fn ed25519(
        kid: impl Into<String>,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<Self, KeyError> {
        let kid = kid.into();
        let key = EncodingKey::from_ed_pem(private_key_pem.as_bytes()).map_err(|source| {
            KeyError::InvalidPem {
                kid: kid.clone(),
                source,
            }
        })?;
        let verifier = DecodingKey::from_ed_pem(public_key_pem.as_bytes()).map_err(|source| {
            KeyError::InvalidPem {
                kid: kid.clone(),
                source,
            }
        })?;

        Ok(Self {
            signing: SigningKey {
                kid: kid.clone(),
                algorithm: Algorithm::EdDSA,
                key,
            },
            verification: vec![VerificationKey::new(kid, Algorithm::EdDSA, verifier)],
        })
    }

    /// Accept tokens signed with a retired HS256 secret.
    pub fn with_hs256_verifier(
        mut self,
        kid: impl Into<String>,
        secret: &[u8],
    ) -> Result<Self, KeyError> {
        let kid = self.check_new_kid(kid.into())?;
        if secret.is_empty() {
            return Err(KeyError::EmptySecret(kid));
        }
        self.verification.push(VerificationKey::new(
            kid,
            Algorithm::HS256,
            DecodingKey::from_secret(secret),
        ));
        Ok(self)
    }

    /// Accept tokens signed with a retired Ed25519 key.
    pub fn with_ed25519_verifier(
        mut self,
        kid: impl Into<String>,
        public_key_pem: &str,
    ) -> Result<Self, KeyError> {
        let kid = self.check_new_kid(kid.into())?;
        let key = DecodingKey::from_ed_pem(public_key_pem.as_bytes()).map_err(|source| {
            KeyError::InvalidPem {
                kid: kid.clone(),
                source,
            }
        })?;
        self.verification
            .push(VerificationKey::new(kid, Algorithm::EdDSA, key));
        Ok(self)
    }

    pub fn signing_kid(&self) -> &str {
        &self.signing.kid
    }

    fn check_new_kid(&self, kid: String) -> Result<String, KeyError> {
        if self.verification.iter().any(|k| k.kid == kid) {
            return Err(KeyError::DuplicateKid(kid));
        }
        Ok(kid)
    }
}

/// Decoded, validated token contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub roles: Option<BTreeSet<Role>>,
    pub token_id: Option<String>,
    pub issuer: Option<String>,
}

/// Payload as it travels on the wire.
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
}

/// Signs and verifies bearer credentials.
///
/// Stateless apart from configuration, so one instance is shared by every call.
pub struct TokenCodec {
    keys: KeySet,
    issuer: Option<String>,
    clock_skew: ChronoDuration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("keys", &self.keys)
            .field("issuer", &self.issuer)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(keys: KeySet, issuer: Option<String>, clock_skew: Duration) -> Self {
        Self {
            keys,
            issuer,
            clock_skew: ChronoDuration::from_std(clock_skew).unwrap_or(ChronoDuration::MAX),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Issue a credential for `identity` that expires `ttl` from now.
    pub fn encode(&self, identity: &Identity, ttl: Duration) -> Result<String, AuthError> {
        let now = self.clock.now();
        let expires_at = ChronoDuration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::internal("ttl out of range"))?;

        let claims = TokenClaims {
            sub: identity.subject.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            roles: Some(identity.role_names()),
            jti: Some(Uuid::new_v4().to_string()),
            iss: self.issuer.clone(),
        };

        let mut header = Header::new(self.keys.signing.algorithm);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.keys.signing.kid.clone());

        jsonwebtoken::encode(&header, &claims, &self.keys.signing.key).map_err(|e| {
            tracing::error!(error = %e, "failed to sign credential");
            AuthError::internal("credential signing failed")
        })
    }

    /// Validate a credential and return its claims.
    ///
    /// Order: structure, expiry, claims, signature. An expired credential is
    /// reported as expired whatever else is wrong with it.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let segments: Vec<&str> = token.split('.').collect();
        let [_, payload, _] = segments.as_slice() else {
            return Err(AuthError::TokenMalformed("segment count"));
        };
        if segments.iter().any(|s| s.is_empty()) {
            return Err(AuthError::TokenMalformed("empty segment"));
        }

        let header =
            jsonwebtoken::decode_header(token).map_err(|_| AuthError::TokenMalformed("header"))?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::TokenMalformed("payload encoding"))?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::TokenMalformed("payload"))?;

        let not_after = self
            .clock
            .now()
            .checked_sub_signed(self.clock_skew)
            .ok_or_else(|| AuthError::internal("clock skew out of range"))?;
        if claims.exp <= not_after.timestamp() {
            return Err(AuthError::TokenExpired);
        }

        if claims.sub.trim().is_empty() {
            return Err(AuthError::TokenMalformed("sub"));
        }
        if let Some(expected) = &self.issuer
            && claims.iss.as_deref() != Some(expected.as_str())
        {
            return Err(AuthError::TokenMalformed("iss"));
        }

        self.verify_signature(token, &header)?;

        let issued_at =
            DateTime::from_timestamp(claims.iat, 0).ok_or(AuthError::TokenMalformed("iat"))?;
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::TokenMalformed("exp"))?;

        Ok(Claims {
            subject: claims.sub,
            issued_at,
            expires_at,
            roles: claims
                .roles
                .map(|names| names.into_iter().map(Role::new).collect()),
            token_id: claims.jti,
            issuer: claims.iss,
        })
    }

    fn verify_signature(&self, token: &str, header: &Header) -> Result<(), AuthError> {
        let candidates = self.keys.verification.iter().filter(|k| {
            k.algorithm == header.alg && header.kid.as_deref().is_none_or(|kid| kid == k.kid)
        });

        for key in candidates {
            match jsonwebtoken::decode::<serde_json::Value>(token, &key.key, &key.validation) {
                Ok(_) => return Ok(()),
                Err(err) => debug!(kid = %key.kid, error = %err, "signature rejected"),
            }
        }

        Err(AuthError::SignatureInvalid)
    }
}
