// HTTP error rendering for the OneRoster routes and the token endpoint
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::error::{AuthFailure, Error, ValidationFailure};

/// HTTP API error. Resource routes render the `imsx` status envelope; the
/// token endpoint renders RFC 6749 `{error, error_description}`.
#[derive(Debug)]
pub enum ApiError {
    // 400
    BadRequest(String),
    // 401
    Unauthorized(AuthFailure),
    // 403
    Forbidden { required: String },
    // 404
    NotFound(String),
    // 409
    Conflict(String),
    // 500
    InternalServerError(String),
    /// Token endpoint failures
    OAuth {
        status: StatusCode,
        error: &'static str,
        description: String,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn oauth(status: StatusCode, error: &'static str, description: impl Into<String>) -> Self {
        ApiError::OAuth {
            status,
            error,
            description: description.into(),
        }
    }

    /// Map a core error raised while issuing a token to its RFC 6749 form
    pub fn from_token_error(err: Error) -> Self {
        match err {
            Error::Unauthenticated(_) => {
                Self::oauth(StatusCode::UNAUTHORIZED, "invalid_client", "Invalid client credentials")
            }
            Error::ValidationFailed(ValidationFailure::InvalidScope(scope)) => Self::oauth(
                StatusCode::BAD_REQUEST,
                "invalid_scope",
                format!("Scope '{}' is not allowed for this client", scope),
            ),
            Error::ValidationFailed(other) => {
                Self::oauth(StatusCode::BAD_REQUEST, "invalid_request", other.to_string())
            }
            other => ApiError::from(other),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::OAuth { status, .. } => *status,
        }
    }

    /// Client-safe description
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg) => msg.clone(),
            ApiError::Unauthorized(failure) => failure.to_string(),
            ApiError::Forbidden { required } => format!("insufficient scope, required: {}", required),
            ApiError::OAuth { description, .. } => description.clone(),
        }
    }

    /// `imsx_codeMinor` value
    pub fn code_minor(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) | ApiError::Conflict(_) => "invaliddata",
            ApiError::Unauthorized(_) => "unauthorisedrequest",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::NotFound(_) => "unknownobject",
            ApiError::InternalServerError(_) => "internal_server_error",
            ApiError::OAuth { .. } => "server_error",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ApiError::OAuth { error, description, .. } => json!({
                "error": error,
                "error_description": description,
            }),
            _ => json!({
                "imsx_codeMajor": "failure",
                "imsx_severity": "error",
                "imsx_description": self.message(),
                "imsx_codeMinor": self.code_minor(),
            }),
        }
    }

    pub fn www_authenticate(&self) -> Option<String> {
        match self {
            ApiError::Unauthorized(AuthFailure::InvalidToken) => {
                Some("Bearer error=\"invalid_token\"".to_string())
            }
            ApiError::Unauthorized(_) => Some("Bearer".to_string()),
            ApiError::Forbidden { required } => Some(format!(
                "Bearer error=\"insufficient_scope\", scope=\"{}\"",
                required
            )),
            _ => None,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Unauthenticated(failure) => ApiError::Unauthorized(failure),
            Error::Forbidden { required } => ApiError::Forbidden { required },
            e @ Error::NotFound { .. } => ApiError::NotFound(e.to_string()),
            e @ (Error::Conflict { .. } | Error::DuplicateKey { .. }) => ApiError::Conflict(e.to_string()),
            Error::ValidationFailed(failure) => ApiError::BadRequest(failure.to_string()),
            Error::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                ApiError::InternalServerError("An unexpected error occurred".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.to_json())).into_response();
        let headers = response.headers_mut();
        if let Some(challenge) = self.www_authenticate().and_then(|c| HeaderValue::from_str(&c).ok()) {
            headers.insert(header::WWW_AUTHENTICATE, challenge);
        }
        if matches!(self, ApiError::OAuth { .. }) {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::ResourceKind;

    #[test]
    fn test_core_error_mapping() {
        let cases = [
            (Error::Unauthenticated(AuthFailure::MissingCredentials), StatusCode::UNAUTHORIZED),
            (Error::Forbidden { required: "x".into() }, StatusCode::FORBIDDEN),
            (
                Error::NotFound { kind: ResourceKind::Category, id: "c".into() },
                StatusCode::NOT_FOUND,
            ),
            (
                Error::Conflict { kind: ResourceKind::Category, id: "c".into() },
                StatusCode::CONFLICT,
            ),
            (
                Error::DuplicateKey { kind: ResourceKind::Result, fields: "lineItemSourcedId, studentSourcedId".into() },
                StatusCode::CONFLICT,
            ),
            (Error::rule("bad"), StatusCode::BAD_REQUEST),
            (Error::Internal("db down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let body = ApiError::from(Error::Internal("password=hunter2".into())).to_json();
        assert!(!body["imsx_description"].as_str().unwrap().contains("hunter2"));
        assert_eq!(body["imsx_codeMajor"], "failure");
    }

    #[test]
    fn test_challenges() {
        assert_eq!(
            ApiError::Unauthorized(AuthFailure::MissingCredentials).www_authenticate().as_deref(),
            Some("Bearer")
        );
        assert_eq!(
            ApiError::Unauthorized(AuthFailure::InvalidToken).www_authenticate().as_deref(),
            Some("Bearer error=\"invalid_token\"")
        );
        assert!(ApiError::Forbidden { required: "s".into() }
            .www_authenticate()
            .unwrap()
            .contains("scope=\"s\""));
    }

    #[test]
    fn test_token_error_mapping() {
        let err = ApiError::from_token_error(Error::Unauthenticated(AuthFailure::InvalidClient));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_json()["error"], "invalid_client");

        let err = ApiError::from_token_error(Error::ValidationFailed(ValidationFailure::InvalidScope("s".into())));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_json()["error"], "invalid_scope");
    }
}
