use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::api::format::record_to_api_value;
use crate::handlers::utils::{parse_id, resolve_entity};
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

/// GET /api/:entity/:id - Get a single decrypted record
pub async fn record_get(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let def = resolve_entity(&entity)?;
    let id = parse_id(&id)?;

    let record = state.service.get(def, id).await?;
    Ok(ApiResponse::success(record_to_api_value(&record)))
}

/// PUT /api/:entity/:id - Update the given fields
pub async fn record_put(
    state: State<AppState>,
    path: Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    record_update(state, path, body).await
}

/// PATCH /api/:entity/:id - Same partial semantics as PUT
pub async fn record_patch(
    state: State<AppState>,
    path: Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    record_update(state, path, body).await
}

async fn record_update(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let def = resolve_entity(&entity)?;
    let id = parse_id(&id)?;
    let Json(input) = body?;

    let record = state.service.update(def, id, input).await?;
    Ok(ApiResponse::success(record_to_api_value(&record)))
}

/// DELETE /api/:entity/:id
pub async fn record_delete(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let def = resolve_entity(&entity)?;
    let id = parse_id(&id)?;

    state.service.delete(def, id).await?;
    Ok(ApiResponse::success(json!({
        "id": id,
        "type": def.table,
        "deleted": true
    })))
}
