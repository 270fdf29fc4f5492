use serde_json::{json, Map, Value};

use crate::entities::{EntityRecord, ID_COLUMN};
use crate::services::{Paginated, SearchResult};

/// Convert a decrypted record into the public wire format
/// { id, type, attributes, links }
///
/// Attributes come from the safe projection, so secret fields and lookup
/// hash columns never appear.
pub fn record_to_api_value(record: &EntityRecord) -> Value {
    let table = record.def().table;
    let mut attributes = record.safe_projection();
    attributes.remove(ID_COLUMN);

    let mut obj = Map::new();
    if let Some(id) = record.id() {
        obj.insert("id".into(), json!(id));
    }
    obj.insert("type".into(), Value::String(table.to_string()));
    obj.insert("attributes".into(), Value::Object(attributes));
    if let Some(id) = record.id() {
        obj.insert("links".into(), json!({ "self": format!("/api/{}/{}", table, id) }));
    }

    Value::Object(obj)
}

pub fn records_to_api_values(records: &[EntityRecord]) -> Vec<Value> {
    records.iter().map(record_to_api_value).collect()
}

pub fn page_to_api_value(page: &Paginated<EntityRecord>) -> Value {
    json!({
        "records": records_to_api_values(&page.data),
        "pagination": {
            "total": page.total,
            "page": page.page,
            "per_page": page.per_page,
            "last_page": page.last_page,
        }
    })
}

pub fn search_to_api_value(result: &SearchResult) -> Value {
    json!({
        "records": records_to_api_values(&result.records),
        "strategy": result.strategy,
        "truncated": result.truncated,
        "rows_scanned": result.rows_scanned,
    })
}
