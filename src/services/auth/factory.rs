/// Factory: build the authentication pipeline from application `Config`.
use std::sync::Arc;

use crate::config::{AuthConfig, SigningKeyConfig};
use crate::repos::UserStore;
use crate::services::auth::authenticator::Authenticator;
use crate::services::auth::policy::AuthorizationPolicy;
use crate::services::auth::token_codec::{KeyError, KeySet, TokenCodec};
use crate::services::identity::resolver::{CachingIdentityResolver, ResolverConfig};

pub fn build_key_set(config: &AuthConfig) -> Result<KeySet, KeyError> {
    let keys = match &config.signing_key {
        SigningKeyConfig::Hs256 { secret } => {
            KeySet::hs256(&config.signing_kid, secret.as_bytes())?
        }
        SigningKeyConfig::Ed25519 {
            private_key_pem,
            public_key_pem,
        } => KeySet::ed25519(&config.signing_kid, private_key_pem, public_key_pem)?,
    };

    let keys = config
        .verification_secrets
        .iter()
        .try_fold(keys, |keys, (kid, secret)| {
            keys.with_hs256_verifier(kid, secret.as_bytes())
        })?;

    config
        .verification_public_keys
        .iter()
        .try_fold(keys, |keys, (kid, pem)| keys.with_ed25519_verifier(kid, pem))
}

pub fn build_token_codec(config: &AuthConfig) -> Result<TokenCodec, KeyError> {
    Ok(TokenCodec::new(
        build_key_set(config)?,
        config.issuer.clone(),
        config.clock_skew,
    ))
}

pub fn build_authenticator(
    config: &AuthConfig,
    store: Arc<dyn UserStore>,
) -> Result<Arc<Authenticator>, KeyError> {
    let codec = build_token_codec(config)?;

    let resolver = CachingIdentityResolver::new(
        store,
        ResolverConfig {
            cache_ttl: config.identity_cache_ttl,
            timeout: config.resolver_timeout,
        },
    );

    let policy = AuthorizationPolicy::new(
        config.public_operations.iter().cloned(),
        config.rules.iter().cloned(),
    );

    Ok(Arc::new(Authenticator::new(
        Arc::new(codec),
        Arc::new(resolver),
        Arc::new(policy),
    )))
}
