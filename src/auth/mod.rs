pub mod authorizer;
pub mod clients;
pub mod issuer;
pub mod scopes;
pub mod token_store;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

pub use authorizer::{bearer_token, ScopeAuthorizer};
pub use clients::{Client, ClientRegistry};
pub use issuer::TokenIssuer;
pub use token_store::TokenStore;

/// Payload signed into every access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default)]
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique per issuance so two tokens minted in the same second never collide
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// An issued access token as held by the token store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub token: String,
    pub client_id: String,
    pub scope: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Space-delimited scope, as returned on the wire
    pub fn scope_string(&self) -> String {
        self.scope.join(" ")
    }

    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Verified identity of the caller behind a bearer token
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    pub client_id: String,
    pub scope: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }
}

/// HS256 key pair shared by the issuer and the authorizer
#[derive(Clone)]
pub struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Random per-process key; tokens do not survive a restart
    pub fn generate() -> Self {
        let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self::from_secret(secret.as_bytes())
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    /// Check signature and structure only; expiry is judged by the caller's clock
    pub fn verify(&self, token: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();
        Ok(decode::<TokenClaims>(token, &self.decoding, &validation)?.claims)
    }
}
