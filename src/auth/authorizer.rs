use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use super::token_store::TokenStore;
use super::{Claims, SigningKeys};
use crate::error::{AuthFailure, Error};

/// Validates bearer tokens and enforces per-operation scopes
pub struct ScopeAuthorizer {
    store: Arc<TokenStore>,
    keys: SigningKeys,
}

impl ScopeAuthorizer {
    pub fn new(store: Arc<TokenStore>, keys: SigningKeys) -> Self {
        Self { store, keys }
    }

    pub fn authenticate(&self, token: &str) -> Result<Claims, Error> {
        self.authenticate_at(token, Utc::now())
    }

    /// Validate a token against an explicit clock.
    ///
    /// Checks run in order: signature/structure, expiry, subject, then
    /// presence in the token store. A well-signed token that was never
    /// issued here, or has been revoked, fails the same way as a forged one.
    pub fn authenticate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, Error> {
        let invalid = Error::Unauthenticated(AuthFailure::InvalidToken);

        let payload = match self.keys.verify(token) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("bearer token rejected: {}", e);
                return Err(invalid);
            }
        };

        if now.timestamp() > payload.exp {
            tracing::warn!(exp = payload.exp, "bearer token rejected: expired");
            return Err(invalid);
        }

        let Some(client_id) = payload.sub.filter(|s| !s.is_empty()) else {
            tracing::warn!("bearer token rejected: no subject");
            return Err(invalid);
        };

        if !self.store.contains(token) {
            tracing::warn!(client_id = %client_id, "bearer token rejected: not issued or revoked");
            return Err(invalid);
        }

        let expires_at = Utc
            .timestamp_opt(payload.exp, 0)
            .single()
            .ok_or(Error::Unauthenticated(AuthFailure::InvalidToken))?;

        Ok(Claims {
            client_id,
            scope: payload.scope.split_whitespace().map(str::to_string).collect(),
            expires_at,
        })
    }

    pub fn require_scope(claims: &Claims, required: &str) -> Result<(), Error> {
        if claims.has_scope(required) {
            Ok(())
        } else {
            tracing::warn!(client_id = %claims.client_id, required, "request rejected: insufficient scope");
            Err(Error::Forbidden {
                required: required.to_string(),
            })
        }
    }

    /// Full check for one request: credentials present, token valid, scope held
    pub fn authorize(&self, authorization: Option<&str>, required: &str) -> Result<Claims, Error> {
        let token = bearer_token(authorization)?;
        let claims = self.authenticate(token)?;
        Self::require_scope(&claims, required)?;
        Ok(claims)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
/// Anything that is not a non-empty Bearer credential counts as no credentials.
pub fn bearer_token(authorization: Option<&str>) -> Result<&str, Error> {
    let missing = Error::Unauthenticated(AuthFailure::MissingCredentials);
    let value = authorization.ok_or(missing)?.trim();
    let (scheme, token) = value
        .split_once(' ')
        .ok_or(Error::Unauthenticated(AuthFailure::MissingCredentials))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(Error::Unauthenticated(AuthFailure::MissingCredentials));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::Unauthenticated(AuthFailure::MissingCredentials));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clients::CLIENT_CREDENTIALS;
    use crate::auth::{Client, ClientRegistry, TokenClaims, TokenIssuer};
    use chrono::Duration;

    struct Fixture {
        issuer: TokenIssuer,
        authorizer: ScopeAuthorizer,
        store: Arc<TokenStore>,
        keys: SigningKeys,
    }

    fn fixture() -> Fixture {
        let clients = Arc::new(ClientRegistry::new());
        clients.register(Client::new(
            "sis",
            "s3cret",
            vec!["read".to_string(), "write".to_string()],
            vec![CLIENT_CREDENTIALS.to_string()],
        ));
        let store = Arc::new(TokenStore::new());
        let keys = SigningKeys::from_secret(b"test-key");
        let issuer = TokenIssuer::new(clients, store.clone(), keys.clone(), Duration::seconds(60)).unwrap();
        let authorizer = ScopeAuthorizer::new(store.clone(), keys.clone());
        Fixture { issuer, authorizer, store, keys }
    }

    #[test]
    fn test_issued_token_authenticates() {
        let f = fixture();
        let token = f.issuer.issue_token("sis", "s3cret", &["write".to_string()]).unwrap();
        let claims = f.authorizer.authenticate(&token.token).unwrap();
        assert_eq!(claims.client_id, "sis");
        assert_eq!(claims.scope, token.scope);
        assert_eq!(claims.expires_at, token.expires_at);
    }

    #[test]
    fn test_revoked_token_rejected() {
        let f = fixture();
        let token = f.issuer.issue_token("sis", "s3cret", &[]).unwrap();
        f.store.delete(&token.token);
        let err = f.authorizer.authenticate(&token.token).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(AuthFailure::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let f = fixture();
        let now = Utc::now();
        let token = f.issuer.issue_token_at("sis", "s3cret", &[], now).unwrap();

        assert!(f.authorizer.authenticate_at(&token.token, token.expires_at).is_ok());
        let later = token.expires_at + Duration::seconds(1);
        assert!(matches!(
            f.authorizer.authenticate_at(&token.token, later),
            Err(Error::Unauthenticated(AuthFailure::InvalidToken))
        ));
    }

    #[test]
    fn test_signed_but_never_issued_rejected() {
        let f = fixture();
        let now = Utc::now().timestamp();
        let forged = f
            .keys
            .sign(&TokenClaims {
                sub: Some("sis".to_string()),
                scope: "read write".to_string(),
                iat: now,
                exp: now + 60,
                jti: None,
            })
            .unwrap();
        assert!(f.authorizer.authenticate(&forged).is_err());
    }

    #[test]
    fn test_missing_subject_rejected_even_if_stored() {
        let f = fixture();
        let now = Utc::now();
        let signed = f
            .keys
            .sign(&TokenClaims {
                sub: None,
                scope: "read".to_string(),
                iat: now.timestamp(),
                exp: now.timestamp() + 60,
                jti: None,
            })
            .unwrap();
        f.store.put(crate::auth::Token {
            token: signed.clone(),
            client_id: "sis".to_string(),
            scope: vec!["read".to_string()],
            issued_at: now,
            expires_at: now + Duration::seconds(60),
        });
        assert!(f.authorizer.authenticate(&signed).is_err());
    }

    #[test]
    fn test_garbage_and_tampered_tokens_rejected() {
        let f = fixture();
        assert!(f.authorizer.authenticate("not-a-jwt").is_err());

        let token = f.issuer.issue_token("sis", "s3cret", &[]).unwrap();
        let mut tampered = token.token.clone();
        tampered.push('x');
        assert!(f.authorizer.authenticate(&tampered).is_err());
    }

    #[test]
    fn test_require_scope() {
        let claims = Claims {
            client_id: "sis".to_string(),
            scope: vec!["read".to_string()],
            expires_at: Utc::now(),
        };
        assert!(ScopeAuthorizer::require_scope(&claims, "read").is_ok());
        assert!(matches!(
            ScopeAuthorizer::require_scope(&claims, "write"),
            Err(Error::Forbidden { ref required }) if required == "write"
        ));
    }

    #[test]
    fn test_authorize_three_tiers() {
        let f = fixture();
        let token = f.issuer.issue_token("sis", "s3cret", &["read".to_string()]).unwrap();
        let header = format!("Bearer {}", token.token);

        assert!(matches!(
            f.authorizer.authorize(None, "read"),
            Err(Error::Unauthenticated(AuthFailure::MissingCredentials))
        ));
        assert!(matches!(
            f.authorizer.authorize(Some("Bearer bogus"), "read"),
            Err(Error::Unauthenticated(AuthFailure::InvalidToken))
        ));
        assert!(matches!(
            f.authorizer.authorize(Some(&header), "write"),
            Err(Error::Forbidden { .. })
        ));
        assert_eq!(f.authorizer.authorize(Some(&header), "read").unwrap().client_id, "sis");
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(Some("bearer   abc ")).unwrap(), "abc");
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer ")).is_err());
        assert!(bearer_token(Some("abc")).is_err());
        assert!(bearer_token(None).is_err());
    }
}
