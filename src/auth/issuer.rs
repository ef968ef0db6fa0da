use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::clients::{dedup, ClientRegistry, CLIENT_CREDENTIALS};
use super::token_store::TokenStore;
use super::{SigningKeys, Token, TokenClaims};
use crate::error::{AuthFailure, Error, ValidationFailure};

/// Issues signed access tokens for the client-credentials grant
pub struct TokenIssuer {
    clients: Arc<ClientRegistry>,
    store: Arc<TokenStore>,
    keys: SigningKeys,
    lifetime: Duration,
    audit: bool,
}

impl TokenIssuer {
    pub fn new(
        clients: Arc<ClientRegistry>,
        store: Arc<TokenStore>,
        keys: SigningKeys,
        lifetime: Duration,
    ) -> Result<Self, Error> {
        if lifetime <= Duration::zero() {
            return Err(Error::Internal("token lifetime must be positive".to_string()));
        }
        Ok(Self {
            clients,
            store,
            keys,
            lifetime,
            audit: false,
        })
    }

    /// Log every issuance at info level instead of debug
    pub fn with_audit_logging(mut self, enabled: bool) -> Self {
        self.audit = enabled;
        self
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    pub fn issue_token(
        &self,
        client_id: &str,
        client_secret: &str,
        requested_scopes: &[String],
    ) -> Result<Token, Error> {
        self.issue_token_at(client_id, client_secret, requested_scopes, Utc::now())
    }

    /// Issue against an explicit clock.
    ///
    /// An empty request grants every scope the client is allowed; otherwise
    /// each requested scope must be allowed or nothing is issued.
    pub fn issue_token_at(
        &self,
        client_id: &str,
        client_secret: &str,
        requested_scopes: &[String],
        now: DateTime<Utc>,
    ) -> Result<Token, Error> {
        let client = match self.clients.authenticate(client_id, client_secret) {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(client_id, "token request rejected: invalid client credentials");
                return Err(err);
            }
        };
        if !client.supports_grant(CLIENT_CREDENTIALS) {
            tracing::warn!(client_id, "token request rejected: client_credentials grant not enabled");
            return Err(Error::Unauthenticated(AuthFailure::InvalidClient));
        }

        let requested = dedup(requested_scopes.iter().cloned());
        let granted = if requested.is_empty() {
            client.allowed_scopes.clone()
        } else {
            if let Some(unknown) = requested.iter().find(|s| !client.allows_scope(s)) {
                tracing::warn!(client_id, scope = %unknown, "token request rejected: scope not allowed");
                return Err(Error::ValidationFailed(ValidationFailure::InvalidScope(unknown.clone())));
            }
            requested
        };

        // JWT timestamps are whole seconds; keep the stored token in step with them
        let issued_at = now.trunc_subsecs(0);
        let expires_at = issued_at + self.lifetime;

        let claims = TokenClaims {
            sub: Some(client.client_id.clone()),
            scope: granted.join(" "),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
        };
        let signed = self.keys.sign(&claims)?;

        let token = Token {
            token: signed,
            client_id: client.client_id.clone(),
            scope: granted,
            issued_at,
            expires_at,
        };
        self.store.put(token.clone());

        if self.audit {
            tracing::info!(client_id, scope = %claims.scope, expires_at = %expires_at, "access token issued");
        } else {
            tracing::debug!(client_id, scope = %claims.scope, "access token issued");
        }

        Ok(token)
    }
}
