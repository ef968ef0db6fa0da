use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::{AuthFailure, Error};

pub const CLIENT_CREDENTIALS: &str = "client_credentials";

/// A registered OAuth client. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Client {
    pub client_id: String,
    secret_digest: [u8; 32],
    pub allowed_scopes: Vec<String>,
    pub grant_types: Vec<String>,
}

impl Client {
    pub fn new(
        client_id: impl Into<String>,
        secret: &str,
        allowed_scopes: impl IntoIterator<Item = String>,
        grant_types: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            secret_digest: digest(secret),
            allowed_scopes: dedup(allowed_scopes),
            grant_types: dedup(grant_types),
        }
    }

    /// Compared as SHA-256 digests
    pub fn verify_secret(&self, candidate: &str) -> bool {
        digest(candidate) == self.secret_digest
    }

    pub fn allows_scope(&self, scope: &str) -> bool {
        self.allowed_scopes.iter().any(|s| s == scope)
    }

    pub fn supports_grant(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }
}

impl From<&ClientConfig> for Client {
    fn from(cfg: &ClientConfig) -> Self {
        Client::new(
            cfg.client_id.clone(),
            &cfg.client_secret,
            cfg.scopes.iter().cloned(),
            cfg.grant_types.iter().cloned(),
        )
    }
}

/// Known clients keyed by client id
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: DashMap<String, Arc<Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(clients: &[ClientConfig]) -> Self {
        let registry = Self::new();
        for cfg in clients {
            if registry.register(Client::from(cfg)).is_some() {
                tracing::warn!("OAuth client '{}' configured more than once; last entry wins", cfg.client_id);
            }
        }
        registry
    }

    /// Returns the client previously registered under the same id, if any
    pub fn register(&self, client: Client) -> Option<Arc<Client>> {
        self.clients.insert(client.client_id.clone(), Arc::new(client))
    }

    pub fn get(&self, client_id: &str) -> Option<Arc<Client>> {
        self.clients.get(client_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a client and check its secret
    pub fn authenticate(&self, client_id: &str, client_secret: &str) -> Result<Arc<Client>, Error> {
        match self.get(client_id) {
            Some(client) if client.verify_secret(client_secret) => Ok(client),
            _ => Err(Error::Unauthenticated(AuthFailure::InvalidClient)),
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Drop repeats and blanks, keeping first-seen order
pub(crate) fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
