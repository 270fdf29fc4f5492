use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::Value;

use crate::api::format::search_to_api_value;
use crate::error::ApiError;
use crate::handlers::utils::resolve_entity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct FindQuery {
    pub q: Option<String>,
    /// Restrict to one field; a lookup-hash field switches to exact match
    pub field: Option<String>,
}

/// GET /api/find/:entity?q=&field= - Search decrypted values
pub async fn find_get(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(query): Query<FindQuery>,
) -> ApiResult<Value> {
    let def = resolve_entity(&entity)?;
    let term = query
        .q
        .ok_or_else(|| ApiError::bad_request("query parameter 'q' is required"))?;
    let field = query.field.as_deref().filter(|f| !f.is_empty());

    let result = state.service.search(def, &term, field).await?;
    Ok(ApiResponse::success(search_to_api_value(&result)))
}
