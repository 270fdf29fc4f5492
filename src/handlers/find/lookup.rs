use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::Value;

use crate::api::format::record_to_api_value;
use crate::error::ApiError;
use crate::handlers::utils::resolve_entity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub value: Option<String>,
}

/// GET /api/lookup/:entity/:field?value= - Exact match through the field's hash
pub async fn lookup_get(
    State(state): State<AppState>,
    Path((entity, field)): Path<(String, String)>,
    Query(query): Query<LookupQuery>,
) -> ApiResult<Value> {
    let def = resolve_entity(&entity)?;
    let value = query
        .value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("query parameter 'value' is required"))?;

    match state.service.find_by_hash(def, &field, &value).await? {
        Some(record) => Ok(ApiResponse::success(record_to_api_value(&record))),
        None => Err(ApiError::not_found(format!("No {} matches that {}", def.label, field))),
    }
}
