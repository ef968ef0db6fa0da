use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::auth::bearer_token;
use crate::handlers::error::ApiError;
use crate::state::AppState;

/// Bearer-token authentication for the OneRoster routes.
///
/// Validates the token and injects the caller's [`crate::auth::Claims`] into
/// request extensions. Scope checks happen in the handlers, which know what
/// each route requires.
pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let claims = {
        let token = bearer_token(authorization)?;
        state.authorizer.authenticate(token)?
    };

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
