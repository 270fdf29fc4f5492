// HTTP API Error Types
use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::DatabaseError;
use crate::encryption::CryptoError;
use crate::entities::validation::ValidationError;
use crate::services::ServiceError;

/// Field error text for values that collide with an existing row
pub const ALREADY_REGISTERED: &str = "already registered";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 422 Unprocessable Entity (well-formed input that collides with stored data)
    UnprocessableEntity {
        message: String,
        field_errors: HashMap<String, String>,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::UnprocessableEntity { .. } => 422,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::UnprocessableEntity { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            ApiError::UnprocessableEntity { message, field_errors } => {
                json!({
                    "error": true,
                    "message": message,
                    "code": "UNPROCESSABLE_ENTITY",
                    "field_errors": field_errors
                })
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UnprocessableEntity { .. } => "UNPROCESSABLE_ENTITY",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn unprocessable_entity(
        message: impl Into<String>,
        field_errors: HashMap<String, String>,
    ) -> Self {
        ApiError::UnprocessableEntity {
            message: message.into(),
            field_errors,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    fn already_registered(field: String) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field, ALREADY_REGISTERED.to_string());
        ApiError::unprocessable_entity("This value is already registered", field_errors)
    }
}

// Convert other error types to ApiError
impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::NotAnObject => ApiError::invalid_json(err.to_string()),
            ValidationError::SystemField(_) | ValidationError::UnknownField(_) => {
                ApiError::bad_request(err.to_string())
            }
            ValidationError::Invalid(field_errors) => {
                ApiError::validation_error("Validation failed", Some(field_errors))
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { .. } => ApiError::not_found(err.to_string()),
            ServiceError::Validation(e) => e.into(),
            ServiceError::DuplicateHash { field } | ServiceError::DuplicateValue { field } => {
                ApiError::already_registered(field)
            }
            ServiceError::InvalidReference { field } => {
                let mut field_errors = HashMap::new();
                field_errors.insert(field, "references a record that does not exist".to_string());
                ApiError::unprocessable_entity("Referenced record does not exist", field_errors)
            }
            ServiceError::StillReferenced { .. } => ApiError::conflict(err.to_string()),
            ServiceError::Immutable(_) => ApiError::forbidden(err.to_string()),
            ServiceError::InvalidLookup { .. }
            | ServiceError::InvalidSearch(_)
            | ServiceError::InvalidFilter(_) => ApiError::bad_request(err.to_string()),
            ServiceError::InvalidCredentials => ApiError::unauthorized("Invalid credentials"),
            ServiceError::Crypto(e) => e.into(),
            ServiceError::Database(e) => e.into(),
        }
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AlreadyEncrypted { .. } => ApiError::bad_request(err.to_string()),
            other => {
                // Never echo crypto details to clients
                tracing::error!("Encryption error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConnectionError(msg) => {
                tracing::error!("Database unavailable: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::UniqueViolation { constraint } => {
                tracing::warn!("Unmapped unique violation: {}", constraint);
                ApiError::conflict("A record with the same values already exists")
            }
            DatabaseError::ForeignKeyViolation { constraint } => {
                tracing::warn!("Unmapped foreign key violation: {}", constraint);
                ApiError::conflict("The operation conflicts with related records")
            }
            DatabaseError::MigrationError(msg) => {
                tracing::error!("Migration error: {}", msg);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
            other => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Database error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_become_422_with_field_errors() {
        let err: ApiError = ServiceError::DuplicateHash {
            field: "correo".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.to_json()["field_errors"]["correo"], json!(ALREADY_REGISTERED));
    }

    #[test]
    fn domain_errors_map_to_precise_statuses() {
        let immutable: ApiError = ServiceError::Immutable("registro de bitácora").into();
        assert_eq!(immutable.status_code(), 403);

        let missing: ApiError = ServiceError::NotFound { entity: "caso", id: 4 }.into();
        assert_eq!(missing.status_code(), 404);
        assert_eq!(missing.message(), "caso 4 not found");

        let creds: ApiError = ServiceError::InvalidCredentials.into();
        assert_eq!(creds.status_code(), 401);

        let mut errors = HashMap::new();
        errors.insert("nombres".to_string(), "This field is required".to_string());
        let invalid: ApiError = ServiceError::Validation(ValidationError::Invalid(errors)).into();
        assert_eq!(invalid.status_code(), 400);
        assert_eq!(invalid.to_json()["code"], json!("VALIDATION_ERROR"));
    }

    #[test]
    fn reference_errors_name_the_column_or_conflict() {
        let missing: ApiError = ServiceError::InvalidReference {
            field: "cliente_id".to_string(),
        }
        .into();
        assert_eq!(missing.status_code(), 422);
        let body = missing.to_json();
        assert!(body["field_errors"]["cliente_id"].is_string());
        assert!(body["field_errors"].get("casos_cliente_id_fkey").is_none());

        let referenced: ApiError = ServiceError::StillReferenced { entity: "usuario", id: 3 }.into();
        assert_eq!(referenced.status_code(), 409);
        assert_eq!(referenced.message(), "usuario 3 is still referenced by other records");

        let unmapped: ApiError = DatabaseError::ForeignKeyViolation {
            constraint: "x_y_fkey".to_string(),
        }
        .into();
        assert_eq!(unmapped.status_code(), 409);
        assert!(!unmapped.message().contains("fkey"));
    }

    #[test]
    fn infrastructure_errors_stay_generic() {
        let err: ApiError = CryptoError::Encryption {
            context: "usuarios.correo".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("usuarios"));

        let down: ApiError = DatabaseError::ConnectionError("refused".to_string()).into();
        assert_eq!(down.status_code(), 503);
        assert!(!down.message().contains("refused"));
    }
}
