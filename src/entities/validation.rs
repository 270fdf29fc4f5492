//! Input validation and normalization for entity payloads.
//!
//! Produces the plaintext row handed to the encryption layer. Every value is
//! checked against its [`FieldKind`], strings are trimmed (passwords excepted),
//! empty optional values become null and defaults are filled in on create.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};

use super::{EntityDef, FieldDef, FieldKind, Row};
use crate::types::Operation;

pub type FieldErrors = HashMap<String, String>;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Expected a JSON object")]
    NotAnObject,
    #[error("System field '{0}' cannot be set via API input")]
    SystemField(String),
    #[error("Unknown field '{0}'")]
    UnknownField(String),
    #[error("Validation failed")]
    Invalid(FieldErrors),
}

impl ValidationError {
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ValidationError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Validate an API payload for `def`.
///
/// `existing` is the current decrypted row on update; cross-field rules are
/// checked against the merge of it and the payload.
pub fn validate(
    def: &EntityDef,
    input: Value,
    operation: Operation,
    existing: Option<&Row>,
) -> Result<Row, ValidationError> {
    let Value::Object(map) = input else {
        return Err(ValidationError::NotAnObject);
    };

    let mut errors = FieldErrors::new();
    let mut row = Row::new();

    for (key, value) in map {
        if def.is_system_column(&key) {
            return Err(ValidationError::SystemField(key));
        }
        let field = def
            .field(&key)
            .ok_or_else(|| ValidationError::UnknownField(key.clone()))?;

        match normalize_value(field, value) {
            Ok(Value::Null) if field.required => {
                errors.insert(key, "This field is required".to_string());
            }
            // Columns with a default are NOT NULL; clearing them restores the default.
            Ok(Value::Null) if field.default.is_some() => {
                let default = field.default.unwrap_or_default();
                row.insert(key, Value::String(default.to_string()));
            }
            Ok(value) => {
                row.insert(key, value);
            }
            Err(message) => {
                errors.insert(key, message);
            }
        }
    }

    if operation == Operation::Create {
        for field in def.fields {
            if row.contains_key(field.name) || errors.contains_key(field.name) {
                continue;
            }
            if let Some(default) = field.default {
                row.insert(field.name.to_string(), Value::String(default.to_string()));
            } else if field.required {
                errors.insert(field.name.to_string(), "This field is required".to_string());
            }
        }
    }

    check_rules(def, &row, existing, &mut errors);

    if errors.is_empty() {
        Ok(row)
    } else {
        Err(ValidationError::Invalid(errors))
    }
}

fn check_rules(def: &EntityDef, row: &Row, existing: Option<&Row>, errors: &mut FieldErrors) {
    for rule in def.rules {
        if merged_value(row, existing, rule.field).and_then(Value::as_str) != Some(rule.equals) {
            continue;
        }
        for name in rule.requires {
            if merged_value(row, existing, name).is_none() && !errors.contains_key(*name) {
                errors.insert(name.to_string(), rule.message.to_string());
            }
        }
    }
}

/// Non-blank value of `name` after applying the payload over the stored row.
fn merged_value<'a>(row: &'a Row, existing: Option<&'a Row>, name: &str) -> Option<&'a Value> {
    match row.get(name) {
        Some(value) => Some(value),
        None => existing.and_then(|e| e.get(name)),
    }
    .filter(|v| !is_blank(v))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Check and normalize one value. Blank values come back as null.
pub fn normalize_value(field: &FieldDef, value: Value) -> Result<Value, String> {
    if let FieldKind::Password { min } = field.kind {
        return match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) if s.is_empty() => Ok(Value::Null),
            Value::String(s) if s.chars().count() < min => {
                Err(format!("Must be at least {} characters", min))
            }
            Value::String(s) => Ok(Value::String(s)),
            _ => Err("Must be a string".to_string()),
        };
    }

    if is_blank(&value) {
        return Ok(Value::Null);
    }

    match field.kind {
        FieldKind::Text { max } => {
            let text = expect_string(value)?;
            check_length(&text, max)?;
            Ok(Value::String(text))
        }
        FieldKind::Email { max } => {
            let text = expect_string(value)?;
            check_length(&text, Some(max))?;
            if !looks_like_email(&text) {
                return Err("Must be a valid email address".to_string());
            }
            Ok(Value::String(text))
        }
        FieldKind::Enum(allowed) => {
            let text = expect_string(value)?;
            if allowed.contains(&text.as_str()) {
                Ok(Value::String(text))
            } else {
                Err(format!("Must be one of: {}", allowed.join(", ")))
            }
        }
        FieldKind::Integer => match value {
            Value::Number(n) if n.is_i64() => Ok(Value::Number(n)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|n| Value::Number(Number::from(n)))
                .map_err(|_| "Must be an integer".to_string()),
            _ => Err("Must be an integer".to_string()),
        },
        FieldKind::Date => {
            let text = expect_string(value)?;
            NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                .map_err(|_| "Must be a date (YYYY-MM-DD)".to_string())
        }
        FieldKind::DateTime => {
            let text = expect_string(value)?;
            parse_datetime(&text)
                .map(|dt| Value::String(dt.format(DATETIME_FORMAT).to_string()))
                .ok_or_else(|| "Must be a date-time (YYYY-MM-DDTHH:MM:SS)".to_string())
        }
        FieldKind::Json => match value {
            Value::Object(_) | Value::Array(_) => Ok(value),
            Value::String(s) => match serde_json::from_str::<Value>(&s) {
                Ok(parsed @ (Value::Object(_) | Value::Array(_))) => Ok(parsed),
                _ => Err("Must be a JSON object or array".to_string()),
            },
            _ => Err("Must be a JSON object or array".to_string()),
        },
        FieldKind::Password { .. } => Ok(value),
    }
}

fn expect_string(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        _ => Err("Must be a string".to_string()),
    }
}

fn check_length(text: &str, max: Option<usize>) -> Result<(), String> {
    match max {
        Some(max) if text.chars().count() > max => {
            Err(format!("Must not exceed {} characters", max))
        }
        _ => Ok(()),
    }
}

fn looks_like_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !text.chars().any(char::is_whitespace)
}

/// Parse the accepted date-time forms. Offsets are converted to UTC.
fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::catalog::{CALENDARIO, CASOS, CLIENTES, REPORTES, USUARIOS};
    use serde_json::json;

    fn errors_of(result: Result<Row, ValidationError>) -> FieldErrors {
        match result {
            Err(ValidationError::Invalid(errors)) => errors,
            other => panic!("expected field errors, got {:?}", other),
        }
    }

    #[test]
    fn create_fills_defaults_and_requires_fields() {
        let row = validate(
            &USUARIOS,
            json!({
                "nombres": " Juan ",
                "apellidos": "Pérez",
                "correo": "Juan@Test.com",
                "password": "secret123"
            }),
            Operation::Create,
            None,
        )
        .unwrap();
        assert_eq!(row["nombres"], json!("Juan"));
        assert_eq!(row["rol"], json!("Asistente"));

        let errors = errors_of(validate(&USUARIOS, json!({}), Operation::Create, None));
        for name in ["nombres", "apellidos", "correo", "password"] {
            assert!(errors.contains_key(name), "{} should be required", name);
        }
        assert!(!errors.contains_key("rol"));
    }

    #[test]
    fn update_only_checks_present_fields() {
        let row = validate(&USUARIOS, json!({ "rol": "Abogado" }), Operation::Update, None).unwrap();
        assert_eq!(row.len(), 1);

        let errors = errors_of(validate(&USUARIOS, json!({ "nombres": "" }), Operation::Update, None));
        assert_eq!(errors["nombres"], "This field is required");
    }

    #[test]
    fn rejects_system_and_unknown_fields() {
        assert!(matches!(
            validate(&USUARIOS, json!({ "correo_hash": "x" }), Operation::Create, None),
            Err(ValidationError::SystemField(f)) if f == "correo_hash"
        ));
        assert!(matches!(
            validate(&USUARIOS, json!({ "id": 3 }), Operation::Update, None),
            Err(ValidationError::SystemField(_))
        ));
        assert!(matches!(
            validate(&USUARIOS, json!({ "expediente_id": "x" }), Operation::Update, None),
            Err(ValidationError::UnknownField(_))
        ));
        assert!(matches!(
            validate(&USUARIOS, json!([1, 2]), Operation::Create, None),
            Err(ValidationError::NotAnObject)
        ));
    }

    #[test]
    fn checks_kinds() {
        let errors = errors_of(validate(
            &USUARIOS,
            json!({ "correo": "not-an-email", "password": "short", "rol": "Juez" }),
            Operation::Update,
            None,
        ));
        assert!(errors["correo"].contains("email"));
        assert!(errors["password"].contains("8"));
        assert!(errors["rol"].contains("Asistente"));

        let row = validate(
            &CASOS,
            json!({ "materia_id": "12", "fecha_inicio": "2024-03-01", "anio": "2024" }),
            Operation::Update,
            None,
        )
        .unwrap();
        assert_eq!(row["materia_id"], json!(12));
        assert_eq!(row["fecha_inicio"], json!("2024-03-01"));

        let errors = errors_of(validate(
            &CASOS,
            json!({ "materia_id": 1.5, "fecha_cierre": "01/03/2024", "anio": "20245" }),
            Operation::Update,
            None,
        ));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn normalizes_datetimes_and_json() {
        let row = validate(
            &CALENDARIO,
            json!({ "fecha_inicio": "2024-05-10 09:30", "fecha_fin": "2024-05-10T12:00:00-05:00" }),
            Operation::Update,
            None,
        )
        .unwrap();
        assert_eq!(row["fecha_inicio"], json!("2024-05-10T09:30:00"));
        assert_eq!(row["fecha_fin"], json!("2024-05-10T17:00:00"));

        let row = validate(
            &REPORTES,
            json!({ "parametros": "{\"anio\": 2024}" }),
            Operation::Update,
            None,
        )
        .unwrap();
        assert_eq!(row["parametros"], json!({ "anio": 2024 }));

        let errors = errors_of(validate(&REPORTES, json!({ "parametros": 5 }), Operation::Update, None));
        assert!(errors.contains_key("parametros"));
    }

    #[test]
    fn person_type_rules_use_merged_record() {
        let errors = errors_of(validate(
            &CLIENTES,
            json!({
                "tipo_persona": "Natural",
                "tipo_documento": "DNI",
                "numero_documento": "12345678",
                "nombres": "Ana"
            }),
            Operation::Create,
            None,
        ));
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("apellidos"));

        let existing = match json!({ "tipo_persona": "Natural", "nombres": "Ana", "apellidos": "Ruiz" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(validate(&CLIENTES, json!({ "telefono": "999" }), Operation::Update, Some(&existing)).is_ok());

        let errors = errors_of(validate(
            &CLIENTES,
            json!({ "tipo_persona": "Jurídica" }),
            Operation::Update,
            Some(&existing),
        ));
        assert!(errors.contains_key("razon_social"));
    }
}
