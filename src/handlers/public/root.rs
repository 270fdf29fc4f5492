use serde_json::{json, Value};

use crate::entities;
use crate::middleware::{ApiResponse, ApiResult};

/// GET / - Service information
pub async fn root_get() -> ApiResult<Value> {
    let tables: Vec<&str> = entities::ALL.iter().map(|def| def.table).collect();

    Ok(ApiResponse::success(json!({
        "name": "Lexdesk API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "entities": tables,
        "endpoints": {
            "health": "/health",
            "login": "POST /auth/login",
            "data": "/api/:entity[/:id]",
            "find": "/api/find/:entity?q=&field=",
            "lookup": "/api/lookup/:entity/:field?value=",
        }
    })))
}
