use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::{EntityDef, Row, ID_COLUMN};

/// A decrypted row of a known entity.
///
/// Serialization always emits the safe projection: secret fields and lookup
/// hash columns never leave the process, whether or not they are encrypted.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    def: &'static EntityDef,
    row: Row,
}

impl EntityRecord {
    pub fn new(def: &'static EntityDef, row: Row) -> Self {
        Self { def, row }
    }

    pub fn def(&self) -> &'static EntityDef {
        self.def
    }

    pub fn id(&self) -> Option<i64> {
        self.row.get(ID_COLUMN).and_then(Value::as_i64)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.row.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.row.get(column).and_then(Value::as_str)
    }

    fn is_exposed(&self, column: &str) -> bool {
        let hidden = self.def.secret_fields().any(|f| f.name == column)
            || self.def.lookup_fields().any(|f| f.hash_column() == column);
        !hidden
    }

    pub fn safe_projection(&self) -> Row {
        self.row
            .iter()
            .filter(|(column, _)| self.is_exposed(column))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }
}

impl Serialize for EntityRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let exposed: Vec<_> = self
            .row
            .iter()
            .filter(|(column, _)| self.is_exposed(column))
            .collect();
        let mut map = serializer.serialize_map(Some(exposed.len()))?;
        for (column, value) in exposed {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
