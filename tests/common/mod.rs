#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use oneroster_gradebook::auth::scopes::{
    RESULTS_CREATEPUT, RESULTS_DELETE, RESULTS_READONLY, ROSTER_CORE_READONLY,
};
use oneroster_gradebook::config::{AppConfig, ClientConfig};
use oneroster_gradebook::database::MemoryStore;
use oneroster_gradebook::{app, AppState, API_BASE};

pub const FULL_CLIENT: (&str, &str) = ("gradebook-admin", "admin-secret");
pub const READER_CLIENT: (&str, &str) = ("gradebook-reader", "reader-secret");

pub const ALL_SCOPES: [&str; 4] = [
    ROSTER_CORE_READONLY,
    RESULTS_READONLY,
    RESULTS_CREATEPUT,
    RESULTS_DELETE,
];

/// In-process server over a fresh in-memory store
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let mut config = AppConfig::development();
        config.oauth.signing_secret = Some("integration-test-secret".to_string());
        config.oauth.clients = vec![
            client(FULL_CLIENT, &ALL_SCOPES),
            client(READER_CLIENT, &[ROSTER_CORE_READONLY, RESULTS_READONLY]),
        ];
        config.query.max_limit = 50;
        config.query.default_limit = 10;

        let state = AppState::new(config, Arc::new(MemoryStore::new()))?;
        let router = app(state.clone());
        Ok(Self { router, state })
    }

    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };
        Ok(TestResponse { status, headers, body })
    }

    /// POST /oauth/token with a form body
    pub async fn token_request(&self, form: &str) -> Result<TestResponse> {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/oauth/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))?;
        self.send(request).await
    }

    /// Issue a token for one of the configured clients
    pub async fn token(&self, (id, secret): (&str, &str), scopes: &[&str]) -> Result<String> {
        let mut form = format!(
            "grant_type=client_credentials&client_id={}&client_secret={}",
            id, secret
        );
        if !scopes.is_empty() {
            form.push_str("&scope=");
            form.push_str(&scopes.join("%20"));
        }
        let response = self.token_request(&form).await?;
        anyhow::ensure!(
            response.status == StatusCode::OK,
            "token request failed: {} {}",
            response.status,
            response.body
        );
        response.body["access_token"]
            .as_str()
            .map(str::to_string)
            .context("missing access_token")
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.token(FULL_CLIENT, &ALL_SCOPES).await
    }

    /// Request against the OneRoster prefix, optionally authenticated and with a JSON body
    pub async fn api(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("{}{}", API_BASE, path));
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }
}

fn client((id, secret): (&str, &str), scopes: &[&str]) -> ClientConfig {
    ClientConfig {
        client_id: id.to_string(),
        client_secret: secret.to_string(),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        grant_types: vec!["client_credentials".to_string()],
    }
}
