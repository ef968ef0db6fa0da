// Generic OneRoster collection handlers, instantiated once per resource type
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::auth::scopes::Access;
use crate::auth::{Claims, ScopeAuthorizer};
use crate::database::models::Resource;
use crate::handlers::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub fields: Option<String>,
}

fn require<R: Resource>(claims: &Claims, access: Access) -> Result<(), ApiError> {
    ScopeAuthorizer::require_scope(claims, R::SCOPES.required(access))?;
    Ok(())
}

/// GET /{collection}
pub async fn list<R: Resource>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Value> {
    require::<R>(&claims, Access::Read)?;
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let query_config = &state.config.query;
    let limit = params.limit.unwrap_or(query_config.default_limit as i64);
    if limit < 1 || limit > query_config.max_limit as i64 {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {}",
            query_config.max_limit
        )));
    }
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::bad_request("offset must be zero or greater"));
    }

    let page = state
        .service::<R>()
        .list(
            limit as usize,
            offset as usize,
            params.filter.as_deref(),
            params.sort.as_deref(),
        )
        .await?;

    let projection = parse_fields(params.fields.as_deref());
    let data: Vec<Value> = page
        .records
        .iter()
        .map(|r| project(R::render(r, &state.config.links), projection.as_deref()))
        .collect();

    let body = json!({
        "data": data,
        "total": page.total,
        "limit": limit,
        "offset": offset,
    });
    Ok(ApiResponse::success(body).with_total_count(page.total))
}

/// GET /{collection}/:id
pub async fn get<R: Resource>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(sourced_id): Path<String>,
) -> ApiResult<Value> {
    require::<R>(&claims, Access::Read)?;
    let record = state.service::<R>().get_by_id(&sourced_id).await?;
    Ok(ApiResponse::success(R::render(&record, &state.config.links)))
}

/// POST /{collection}
pub async fn create<R: Resource>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    require::<R>(&claims, Access::Write)?;
    let body = object_body(body)?;
    let record = state.service::<R>().create(&body).await?;
    Ok(ApiResponse::created(R::render(&record, &state.config.links)))
}

/// PUT /{collection}/:id - partial merge of the fields present
pub async fn update<R: Resource>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(sourced_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    require::<R>(&claims, Access::Write)?;
    let body = object_body(body)?;
    let record = state.service::<R>().update(&sourced_id, &body).await?;
    Ok(ApiResponse::success(R::render(&record, &state.config.links)))
}

/// DELETE /{collection}/:id - soft delete
pub async fn delete<R: Resource>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(sourced_id): Path<String>,
) -> ApiResult<()> {
    require::<R>(&claims, Access::Delete)?;
    state.service::<R>().soft_delete(&sourced_id).await?;
    Ok(ApiResponse::<()>::no_content())
}

fn object_body(body: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, ApiError> {
    match body {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(_) => Err(ApiError::bad_request("request body must be a JSON object")),
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    }
}

/// `fields=sourcedId,title` -> ["sourcedId", "title"]; `None` means no projection
fn parse_fields(fields: Option<&str>) -> Option<Vec<String>> {
    let names: Vec<String> = fields?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

/// Keep only the requested keys, plus `sourcedId`
fn project(rendered: Value, fields: Option<&[String]>) -> Value {
    match (fields, rendered) {
        (Some(fields), Value::Object(map)) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k == "sourcedId" || fields.iter().any(|f| f == k))
                .collect(),
        ),
        (_, other) => other,
    }
}
