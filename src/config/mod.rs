use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OAUTH_TOKEN_LIFETIME must be a positive number of seconds, got '{0}'")]
    InvalidTokenLifetime(String),

    #[error("failed to read clients file {path}: {source}")]
    ClientsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid clients file: {0}")]
    ClientsYaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub query: QueryConfig,
    pub database: DatabaseConfig,
    pub links: LinkConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// A statically configured OAuth client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<String>,
}

fn default_grant_types() -> Vec<String> {
    vec!["client_credentials".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub clients: Vec<ClientConfig>,
    pub token_lifetime_secs: u64,
    /// HS256 signing secret; a random per-process key is used when unset
    #[serde(skip_serializing)]
    pub signing_secret: Option<String>,
    pub token_sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

/// Base URLs used when rendering GUIDRef hrefs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub api_base_url: String,
    pub rostering_base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_audit_logging: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(&lookup)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // OAuth overrides
        if let (Some(id), Some(secret)) = (lookup("OAUTH_CLIENT_ID"), lookup("OAUTH_CLIENT_SECRET")) {
            let scopes = lookup("OAUTH_CLIENT_SCOPES")
                .map(|v| split_list(&v, ','))
                .unwrap_or_default();
            self.oauth.clients.push(ClientConfig {
                client_id: id,
                client_secret: secret,
                scopes,
                grant_types: default_grant_types(),
            });
        }
        if let Some(path) = lookup("OAUTH_CLIENTS_FILE") {
            let path = PathBuf::from(path);
            let raw = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::ClientsFile { path: path.clone(), source })?;
            self.oauth.clients.extend(parse_clients_yaml(&raw)?);
        }
        if let Some(v) = lookup("OAUTH_TOKEN_LIFETIME") {
            match v.parse::<u64>() {
                Ok(secs) if secs > 0 => self.oauth.token_lifetime_secs = secs,
                _ => return Err(ConfigError::InvalidTokenLifetime(v)),
            }
        }
        if let Some(v) = lookup("OAUTH_SIGNING_SECRET") {
            if !v.is_empty() {
                self.oauth.signing_secret = Some(v);
            }
        }
        if let Some(v) = lookup("TOKEN_SWEEP_INTERVAL_SECS") {
            self.oauth.token_sweep_interval_secs = v.parse().ok().filter(|secs| *secs > 0);
        }

        // Query overrides
        if let Some(v) = lookup("QUERY_DEFAULT_LIMIT") {
            self.query.default_limit = v.parse().unwrap_or(self.query.default_limit);
        }
        if let Some(v) = lookup("QUERY_MAX_LIMIT") {
            self.query.max_limit = v.parse().unwrap_or(self.query.max_limit);
        }
        if let Some(v) = lookup("QUERY_DEBUG_LOGGING") {
            self.query.debug_logging = v.parse().unwrap_or(self.query.debug_logging);
        }

        // Database overrides
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Link overrides
        if let Some(v) = lookup("API_BASE_URL") {
            self.links.api_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("ROSTERING_SERVICE_BASE_URL") {
            self.links.rostering_base_url = v.trim_end_matches('/').to_string();
        }

        // Logging overrides
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v.to_ascii_lowercase();
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            self.logging.format = match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                _ => self.logging.format,
            };
        }

        // Security overrides
        if let Some(v) = lookup("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }

        // Clamp so the default page always fits within the cap
        if self.query.max_limit == 0 {
            self.query.max_limit = 1;
        }
        self.query.default_limit = self.query.default_limit.clamp(1, self.query.max_limit);

        Ok(self)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            oauth: OAuthConfig {
                clients: vec![],
                token_lifetime_secs: 3600,
                signing_secret: None,
                token_sweep_interval_secs: None,
            },
            query: QueryConfig {
                default_limit: 100,
                max_limit: 1000,
                debug_logging: true,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                connection_timeout: 30,
            },
            links: LinkConfig {
                api_base_url: "http://localhost:8000".to_string(),
                rostering_base_url: "http://localhost:8000".to_string(),
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            security: SecurityConfig {
                enable_audit_logging: false,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            oauth: OAuthConfig {
                clients: vec![],
                token_lifetime_secs: 3600,
                signing_secret: None,
                token_sweep_interval_secs: Some(600),
            },
            query: QueryConfig {
                default_limit: 100,
                max_limit: 1000,
                debug_logging: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 10,
            },
            links: LinkConfig {
                api_base_url: "https://staging.example.com".to_string(),
                rostering_base_url: "https://staging.example.com".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
            },
            security: SecurityConfig {
                enable_audit_logging: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            oauth: OAuthConfig {
                clients: vec![],
                token_lifetime_secs: 3600,
                signing_secret: None,
                token_sweep_interval_secs: Some(300),
            },
            query: QueryConfig {
                default_limit: 100,
                max_limit: 1000,
                debug_logging: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 5,
            },
            links: LinkConfig {
                api_base_url: "https://api.example.com".to_string(),
                rostering_base_url: "https://api.example.com".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
            },
            security: SecurityConfig {
                enable_audit_logging: true,
            },
        }
    }
}

/// Parse the `OAUTH_CLIENTS_FILE` format: a YAML list of clients
pub fn parse_clients_yaml(raw: &str) -> Result<Vec<ClientConfig>, ConfigError> {
    Ok(serde_yaml::from_str(raw)?)
}

fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.oauth.token_lifetime_secs, 3600);
        assert_eq!(config.query.max_limit, 1000);
        assert!(config.oauth.clients.is_empty());
    }

    #[test]
    fn test_production_profile_selected() {
        let config = AppConfig::from_lookup(lookup_from(&[("APP_ENV", "prod")])).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.security.enable_audit_logging);
    }

    #[test]
    fn test_client_from_env_splits_scopes() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("OAUTH_CLIENT_ID", "sis"),
            ("OAUTH_CLIENT_SECRET", "s3cret"),
            ("OAUTH_CLIENT_SCOPES", "a.readonly, b.createput ,"),
        ]))
        .unwrap();
        assert_eq!(config.oauth.clients.len(), 1);
        let client = &config.oauth.clients[0];
        assert_eq!(client.client_id, "sis");
        assert_eq!(client.scopes, vec!["a.readonly", "b.createput"]);
        assert_eq!(client.grant_types, vec!["client_credentials"]);
    }

    #[test]
    fn test_zero_token_lifetime_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("OAUTH_TOKEN_LIFETIME", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTokenLifetime(_)));
    }

    #[test]
    fn test_default_limit_clamped_to_max() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("QUERY_DEFAULT_LIMIT", "500"),
            ("QUERY_MAX_LIMIT", "50"),
        ]))
        .unwrap();
        assert_eq!(config.query.max_limit, 50);
        assert_eq!(config.query.default_limit, 50);
    }

    #[test]
    fn test_parse_clients_yaml() {
        let yaml = r#"
- client_id: reader
  client_secret: r
  scopes: [scope.readonly]
- client_id: writer
  client_secret: w
  scopes: [scope.readonly, scope.createput]
  grant_types: [client_credentials]
"#;
        let clients = parse_clients_yaml(yaml).unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].grant_types, vec!["client_credentials"]);
        assert_eq!(clients[1].scopes.len(), 2);
    }
}
