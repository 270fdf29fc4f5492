use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::api::format::{page_to_api_value, record_to_api_value};
use crate::error::ApiError;
use crate::handlers::utils::resolve_entity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::services::ListQuery;

/// GET /api/:entity - Paginated list ordered by id
///
/// `page` and `per_page` control pagination; every other query parameter is
/// an equality filter on a column. Filters on lookup-hash fields go through
/// the hash column.
pub async fn entity_get(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Value> {
    let def = resolve_entity(&entity)?;
    let query = list_query(&state, params)?;

    let page = state.service.list(def, &query).await?;
    Ok(ApiResponse::success(page_to_api_value(&page)))
}

/// POST /api/:entity - Create a record
pub async fn entity_post(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let def = resolve_entity(&entity)?;
    let Json(input) = body?;

    let record = state.service.create(def, input).await?;
    tracing::debug!(table = def.table, id = record.id(), "record created");
    Ok(ApiResponse::created(record_to_api_value(&record)))
}

fn list_query(state: &AppState, params: Vec<(String, String)>) -> Result<ListQuery, ApiError> {
    let mut query = ListQuery {
        page: 1,
        per_page: state.api.default_page_size,
        filters: Vec::new(),
    };

    for (key, value) in params {
        match key.as_str() {
            "page" => query.page = parse_positive(&key, &value)?,
            "per_page" => query.per_page = parse_positive(&key, &value)?.min(state.api.max_page_size),
            _ => query.filters.push((key, value)),
        }
    }
    Ok(query)
}

fn parse_positive(key: &str, value: &str) -> Result<u32, ApiError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ApiError::bad_request(format!("'{}' must be a positive integer", key))),
    }
}
