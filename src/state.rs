use chrono::Duration;
use std::sync::Arc;

use crate::auth::{ClientRegistry, ScopeAuthorizer, SigningKeys, TokenIssuer, TokenStore};
use crate::config::AppConfig;
use crate::database::models::Resource;
use crate::database::RecordStore;
use crate::error::{Error, Result};
use crate::filter::QueryEngine;
use crate::services::ResourceService;

/// One year
const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub clients: Arc<ClientRegistry>,
    pub tokens: Arc<TokenStore>,
    pub issuer: Arc<TokenIssuer>,
    pub authorizer: Arc<ScopeAuthorizer>,
    pub engine: QueryEngine,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let keys = match config.oauth.signing_secret.as_deref() {
            Some(secret) => SigningKeys::from_secret(secret.as_bytes()),
            None => {
                tracing::warn!("OAUTH_SIGNING_SECRET not set; using a random key, tokens will not survive a restart");
                SigningKeys::generate()
            }
        };

        let clients = Arc::new(ClientRegistry::from_config(&config.oauth.clients));
        if clients.is_empty() {
            tracing::warn!("no OAuth clients configured; every token request will fail");
        }

        let lifetime_secs = i64::try_from(config.oauth.token_lifetime_secs)
            .ok()
            .filter(|secs| *secs <= MAX_TOKEN_LIFETIME_SECS)
            .ok_or_else(|| Error::Internal("token lifetime out of range".to_string()))?;
        let tokens = Arc::new(TokenStore::new());
        let issuer = TokenIssuer::new(clients.clone(), tokens.clone(), keys.clone(), Duration::seconds(lifetime_secs))?
            .with_audit_logging(config.security.enable_audit_logging);
        let authorizer = ScopeAuthorizer::new(tokens.clone(), keys);
        let engine = QueryEngine::new(store).with_debug_logging(config.query.debug_logging);

        Ok(Self {
            config: Arc::new(config),
            clients,
            tokens,
            issuer: Arc::new(issuer),
            authorizer: Arc::new(authorizer),
            engine,
        })
    }

    pub fn service<R: Resource>(&self) -> ResourceService<R> {
        ResourceService::new(self.engine.clone())
    }
}
