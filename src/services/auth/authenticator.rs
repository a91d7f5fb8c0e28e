//! Per-call authentication pipeline.
//!
//! `Start → TokenExtracted → ClaimsValidated → IdentityResolved → Authorized`,
//! after which the middleware dispatches. Any failure ends the call in
//! `RejectedUnauthenticated` or `RejectedForbidden`; nothing is retried.

use std::sync::Arc;

use axum::http::{HeaderMap, header};
use tracing::debug;

use crate::services::auth::error::{AuthError, Rejection};
use crate::services::auth::policy::{AuthorizationPolicy, Decision};
use crate::services::auth::token_codec::{Claims, TokenCodec};
use crate::services::identity::resolver::IdentityResolver;
use crate::services::identity::types::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Start,
    TokenExtracted,
    ClaimsValidated,
    IdentityResolved,
    Authorized,
    Dispatched,
    RejectedUnauthenticated,
    RejectedForbidden,
}

impl CallState {
    pub fn rejected(err: &AuthError) -> Self {
        match err.rejection() {
            Rejection::Unauthenticated => Self::RejectedUnauthenticated,
            Rejection::Forbidden => Self::RejectedForbidden,
        }
    }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone)]
pub enum Admission {
    /// Operation is on the allow-list; no credential was looked at.
    Public,
    Authenticated {
        identity: Arc<Identity>,
        claims: Claims,
    },
}

/// Pull the bearer credential out of call metadata.
///
/// Absent, repeated, non-ASCII, non-Bearer and empty values are all `TokenMissing`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let mut values = headers.get_all(header::AUTHORIZATION).iter();
    let (Some(value), None) = (values.next(), values.next()) else {
        return Err(AuthError::TokenMissing);
    };

    let value = value.to_str().map_err(|_| AuthError::TokenMissing)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::TokenMissing)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::TokenMissing);
    }

    match token.trim() {
        "" => Err(AuthError::TokenMissing),
        token => Ok(token),
    }
}

pub struct Authenticator {
    codec: Arc<TokenCodec>,
    resolver: Arc<dyn IdentityResolver>,
    policy: Arc<AuthorizationPolicy>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("codec", &self.codec)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Authenticator {
    pub fn new(
        codec: Arc<TokenCodec>,
        resolver: Arc<dyn IdentityResolver>,
        policy: Arc<AuthorizationPolicy>,
    ) -> Self {
        Self {
            codec,
            resolver,
            policy,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn resolver(&self) -> &dyn IdentityResolver {
        self.resolver.as_ref()
    }

    /// Run the pipeline for one call of `operation`.
    pub async fn admit(
        &self,
        operation: &str,
        headers: &HeaderMap,
    ) -> Result<Admission, AuthError> {
        debug!(operation, state = ?CallState::Start);
        if self.policy.is_public(operation) {
            return Ok(Admission::Public);
        }

        let token = bearer_token(headers)?;
        debug!(operation, state = ?CallState::TokenExtracted);

        let claims = self.codec.decode(token)?;
        debug!(operation, state = ?CallState::ClaimsValidated, jti = ?claims.token_id);

        let identity = self.resolver.resolve(&claims.subject).await?;
        debug!(operation, state = ?CallState::IdentityResolved, subject = %identity.subject);

        if self.policy.check(&identity, operation) == Decision::Deny {
            return Err(AuthError::PermissionDenied(operation.to_owned()));
        }
        debug!(operation, state = ?CallState::Authorized);

        Ok(Admission::Authenticated { identity, claims })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use axum::http::HeaderValue;

    use super::*;
    use crate::services::auth::policy::AuthorizationRule;
    use crate::services::auth::token_codec::KeySet;
    use crate::services::identity::resolver::InMemoryIdentityResolver;
    use crate::services::identity::types::Role;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append(header::AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    fn person(subject: &str, roles: &[&str], active: bool) -> Identity {
        Identity {
            id: format!("id-{subject}"),
            subject: subject.into(),
            email: None,
            roles: roles.iter().map(|r| Role::new(*r)).collect(),
            active,
        }
    }

    fn authenticator() -> Authenticator {
        let keys = KeySet::hs256("k1", b"unit-secret").unwrap();
        let codec = TokenCodec::new(keys, None, Duration::ZERO);
        let resolver = InMemoryIdentityResolver::new([
            person("alice", &["ADMIN"], true),
            person("bob", &["USER"], true),
            person("carol", &["ADMIN"], false),
        ]);
        let policy = AuthorizationPolicy::new(
            ["Login".to_string()],
            [
                AuthorizationRule::any("DeleteProduct", &["ADMIN"]),
                AuthorizationRule::any("GetProduct", &["USER", "ADMIN"]),
            ],
        );
        Authenticator::new(Arc::new(codec), Arc::new(resolver), Arc::new(policy))
    }

    fn bearer_for(auth: &Authenticator, subject: &str) -> HeaderMap {
        let token = auth
            .codec()
            .encode(&person(subject, &["USER"], true), Duration::from_secs(60))
            .unwrap();
        headers(&[format!("Bearer {token}").as_str()])
    }

    #[test]
    fn extracts_bearer_credentials() {
        assert_eq!(bearer_token(&headers(&["Bearer abc.def.ghi"])), Ok("abc.def.ghi"));
        assert_eq!(bearer_token(&headers(&["bearer  abc.def.ghi "])), Ok("abc.def.ghi"));
    }

    #[test]
    fn missing_empty_or_foreign_credentials_are_token_missing() {
        for case in [
            headers(&[]),
            headers(&[""]),
            headers(&["Bearer"]),
            headers(&["Bearer    "]),
            headers(&["Basic dXNlcjpwYXNz"]),
            headers(&["Bearer a.b.c", "Bearer d.e.f"]),
        ] {
            assert_eq!(bearer_token(&case), Err(AuthError::TokenMissing), "{case:?}");
        }
    }

    #[tokio::test]
    async fn public_operation_needs_no_credential() {
        let auth = authenticator();
        let admission = auth.admit("Login", &HeaderMap::new()).await.unwrap();
        assert!(matches!(admission, Admission::Public));
    }

    #[tokio::test]
    async fn admin_is_admitted_with_resolved_roles() {
        let auth = authenticator();
        // Embedded roles say USER; the resolved identity is authoritative.
        let admission = auth
            .admit("DeleteProduct", &bearer_for(&auth, "alice"))
            .await
            .unwrap();

        let Admission::Authenticated { identity, claims } = admission else {
            panic!("expected an authenticated admission");
        };
        assert_eq!(identity.subject, "alice");
        assert_eq!(claims.subject, "alice");
        assert_eq!(identity.roles, BTreeSet::from([Role::admin()]));
    }

    #[tokio::test]
    async fn rejections_land_in_the_right_terminal_state() {
        let auth = authenticator();

        let cases = [
            ("DeleteProduct", HeaderMap::new(), AuthError::TokenMissing),
            ("DeleteProduct", headers(&["Bearer x.y.z"]), AuthError::TokenMalformed("header")),
            ("GetProduct", bearer_for(&auth, "nobody"), AuthError::IdentityNotFound),
            ("GetProduct", bearer_for(&auth, "carol"), AuthError::IdentityDeactivated),
            (
                "DeleteProduct",
                bearer_for(&auth, "bob"),
                AuthError::PermissionDenied("DeleteProduct".into()),
            ),
            (
                "UnlistedOperation",
                bearer_for(&auth, "alice"),
                AuthError::PermissionDenied("UnlistedOperation".into()),
            ),
        ];

        for (operation, headers, expected) in cases {
            let err = auth.admit(operation, &headers).await.unwrap_err();
            assert_eq!(err, expected, "{operation}");
        }

        let forbidden = auth
            .admit("DeleteProduct", &bearer_for(&auth, "bob"))
            .await
            .unwrap_err();
        assert_eq!(CallState::rejected(&forbidden), CallState::RejectedForbidden);
    }
}
