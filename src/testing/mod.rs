use std::sync::Arc;

use serde_json::Value;

use crate::database::MemoryStore;
use crate::encryption::{AppKey, AttributeCodec, FieldCipher, KEY_SIZE};
use crate::entities::Row;
use crate::services::EntityService;

/// Scan ceiling used by default in unit tests
pub const TEST_SCAN_ROWS: usize = 100;

/// Fixed key so failures reproduce
pub fn test_key() -> AppKey {
    AppKey::from_bytes([7u8; KEY_SIZE])
}

pub fn test_codec() -> AttributeCodec {
    AttributeCodec::new(FieldCipher::new(&test_key()))
}

/// Service over a fresh in-memory store; the store is returned too so tests
/// can inspect rows in storage form
pub fn memory_service() -> (EntityService, Arc<MemoryStore>) {
    memory_service_with_scan_limit(TEST_SCAN_ROWS)
}

pub fn memory_service_with_scan_limit(max_scan_rows: usize) -> (EntityService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = EntityService::new(store.clone(), Arc::new(test_codec()), max_scan_rows);
    (service, store)
}

/// Unwrap a `json!` object literal into a row
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}
