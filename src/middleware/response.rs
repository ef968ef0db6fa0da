use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::handlers::error::ApiError;

pub static X_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

/// Successful API response with an optional total-count header
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
    pub total_count: Option<u64>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 OK
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
            total_count: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
            total_count: None,
        }
    }

    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    /// 204, body ignored
    pub fn no_content() -> ApiResponse<()> {
        ApiResponse::with_status((), StatusCode::NO_CONTENT)
    }

    pub fn with_total_count(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        let body = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "imsx_codeMajor": "failure",
                        "imsx_severity": "error",
                        "imsx_description": "Failed to serialize response data",
                        "imsx_codeMinor": "internal_server_error",
                    })),
                )
                    .into_response();
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(total) = self.total_count {
            response.headers_mut().insert(X_TOTAL_COUNT.clone(), HeaderValue::from(total));
        }
        response
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;
