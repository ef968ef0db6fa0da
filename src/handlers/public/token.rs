use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::clients::CLIENT_CREDENTIALS;
use crate::handlers::error::ApiError;
use crate::state::AppState;

/// `application/x-www-form-urlencoded` token request. Every field is optional
/// here so missing ones produce an OAuth error body rather than a bare 422.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
}

/// POST /oauth/token - client credentials grant
pub async fn token_post(
    State(state): State<AppState>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Form(request) = form.map_err(|e| invalid_request(e.body_text()))?;

    let grant_type = non_empty(request.grant_type).ok_or_else(|| invalid_request("grant_type is required"))?;
    if grant_type != CLIENT_CREDENTIALS {
        return Err(ApiError::oauth(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            "Only client_credentials grant type is supported",
        ));
    }
    let client_id = non_empty(request.client_id).ok_or_else(|| invalid_request("client_id is required"))?;
    let client_secret =
        non_empty(request.client_secret).ok_or_else(|| invalid_request("client_secret is required"))?;

    let requested: Vec<String> = request
        .scope
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let token = state
        .issuer
        .issue_token(&client_id, &client_secret, &requested)
        .map_err(ApiError::from_token_error)?;

    let body = TokenResponse {
        scope: token.scope_string(),
        expires_in: token.expires_in(),
        access_token: token.token,
        token_type: "Bearer",
    };
    Ok((
        [(header::CACHE_CONTROL, "no-store"), (header::PRAGMA, "no-cache")],
        Json(body),
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn invalid_request(description: impl Into<String>) -> ApiError {
    ApiError::oauth(StatusCode::BAD_REQUEST, "invalid_request", description)
}
