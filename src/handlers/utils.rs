use crate::entities::{self, EntityDef};
use crate::error::ApiError;

/// Resolve the `:entity` path segment against the catalog
pub fn resolve_entity(name: &str) -> Result<&'static EntityDef, ApiError> {
    entities::lookup(name).ok_or_else(|| ApiError::not_found(format!("Unknown entity '{}'", name)))
}

pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::bad_request(format!("Invalid record id '{}'", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_catalog_names() {
        assert_eq!(resolve_entity("comentarios-casos").map(|d| d.table).ok(), Some("comentarios_casos"));
        assert_eq!(resolve_entity("facturas").map_err(|e| e.status_code()).err(), Some(404));
    }

    #[test]
    fn rejects_bad_ids() {
        assert_eq!(parse_id("12").ok(), Some(12));
        assert!(parse_id("0").is_err());
        assert!(parse_id("abc").is_err());
    }
}
