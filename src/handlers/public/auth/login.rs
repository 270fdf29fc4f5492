// handlers/public/auth/login.rs - POST /auth/login handler

use std::collections::HashMap;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::api::format::record_to_api_value;
use crate::entities::catalog::USUARIOS;
use crate::entities::validation::normalize_value;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::services::ServiceError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub correo: String,
    pub password: String,
}

/// POST /auth/login - Check credentials and return the user's safe projection
///
/// No token is issued. Unknown emails and wrong passwords are
/// indistinguishable to the caller.
///
/// ```json
/// { "correo": "ana@estudio.pe", "password": "..." }
/// ```
pub async fn login_post(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = body?;
    check_credentials(&request)?;

    match state.service.authenticate(&request.correo, &request.password).await {
        Ok(user) => {
            tracing::info!(user_id = user.id(), "login succeeded");
            Ok(ApiResponse::success(record_to_api_value(&user)))
        }
        Err(ServiceError::InvalidCredentials) => {
            tracing::warn!("login rejected");
            Err(ServiceError::InvalidCredentials.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Shape checks from the user definition: a valid email and a password long
/// enough to have been accepted at registration.
fn check_credentials(request: &LoginRequest) -> Result<(), ApiError> {
    let mut field_errors = HashMap::new();
    for (name, value) in [("correo", request.correo.trim()), ("password", request.password.as_str())] {
        let Some(field) = USUARIOS.field(name) else {
            continue;
        };
        let problem = if value.is_empty() {
            Some("This field is required".to_string())
        } else {
            normalize_value(field, Value::String(value.to_string())).err()
        };
        if let Some(message) = problem {
            field_errors.insert(name.to_string(), message);
        }
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation_error("Validation failed", Some(field_errors)))
    }
}
