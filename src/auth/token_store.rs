use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::Token;

/// Currently valid issued tokens, keyed by the token string itself.
///
/// Expired entries are not purged on their own; validation rejects them and
/// `evict_expired` is available for out-of-band cleanup.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: DashMap<String, Token>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, token: Token) {
        self.tokens.insert(token.token.clone(), token);
    }

    pub fn get(&self, token: &str) -> Option<Token> {
        self.tokens.get(token).map(|entry| entry.value().clone())
    }

    /// Revoke a token. Returns the removed entry.
    pub fn delete(&self, token: &str) -> Option<Token> {
        self.tokens.remove(token).map(|(_, t)| t)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Drop every token already past its expiry, returning how many went
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| !token.is_expired_at(now));
        before.saturating_sub(self.tokens.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(value: &str, expires_in: i64) -> Token {
        let now = Utc::now();
        Token {
            token: value.to_string(),
            client_id: "c".to_string(),
            scope: vec!["s".to_string()],
            issued_at: now,
            expires_at: now + Duration::seconds(expires_in),
        }
    }

    #[test]
    fn test_put_get_delete() {
        let store = TokenStore::new();
        store.put(token("t1", 60));

        assert!(store.contains("t1"));
        assert_eq!(store.get("t1").unwrap().client_id, "c");
        assert_eq!(store.delete("t1").unwrap().token, "t1");
        assert!(!store.contains("t1"));
        assert!(store.delete("t1").is_none());
    }

    #[test]
    fn test_evict_expired_keeps_live_tokens() {
        let store = TokenStore::new();
        store.put(token("live", 60));
        store.put(token("dead", -60));

        assert_eq!(store.evict_expired(Utc::now()), 1);
        assert!(store.contains("live"));
        assert!(!store.contains("dead"));
    }

    #[tokio::test]
    async fn test_concurrent_puts_are_not_lost() {
        let store = std::sync::Arc::new(TokenStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.put(token(&format!("t{}", i), 60));
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.len(), 32);
    }
}
