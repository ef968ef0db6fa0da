// Public handlers: no bearer token required
pub mod token;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::routes::API_BASE;
use crate::state::AppState;
use crate::types::format_timestamp;

pub use token::token_post;

/// GET / - service description
pub async fn root_get() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "specification": "IMS Global OneRoster v1.2",
        "description": "OneRoster Gradebook Service",
        "endpoints": {
            "token": "/oauth/token",
            "categories": format!("{}/categories", API_BASE),
            "lineItems": format!("{}/lineItems", API_BASE),
            "results": format!("{}/results", API_BASE),
        },
        "documentation": "https://www.imsglobal.org/spec/oneroster/v1p2",
    }))
}

/// GET /health - liveness plus a record store ping
pub async fn health_get(State(state): State<AppState>) -> impl IntoResponse {
    let (status, store) = match state.engine.store().health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!("record store health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };
    let body = json!({
        "status": if status == StatusCode::OK { "ok" } else { "degraded" },
        "store": store,
        "timestamp": format_timestamp(&Utc::now()),
        "environment": format!("{:?}", state.config.environment).to_lowercase(),
    });
    (status, Json(body))
}
