use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::store::{Condition, EntityStore, Page};
use crate::entities::{EntityDef, Row, ID_COLUMN};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Row>,
}

impl Table {
    /// First UNIQUE constraint `row` would violate, ignoring the row `skip`.
    fn violated_constraint(&self, def: &EntityDef, row: &Row, skip: Option<i64>) -> Option<String> {
        def.unique_columns().into_iter().find_map(|column| {
            let value = row.get(&column).filter(|v| !v.is_null())?;
            let taken = self
                .rows
                .iter()
                .any(|(id, existing)| Some(*id) != skip && existing.get(&column) == Some(value));
            taken.then(|| def.constraint_name(&column))
        })
    }
}

/// In-process store with the same contract and UNIQUE constraints as the
/// PostgreSQL schema. Used by tests and `DATABASE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<&'static str, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a row exactly as given, bypassing every check. Lets tests and
    /// fixtures seed rows that predate encryption.
    pub async fn seed(&self, def: &EntityDef, mut row: Row) -> i64 {
        let mut tables = self.tables.write().await;
        let table = tables.entry(def.table).or_default();
        table.next_id += 1;
        let id = table.next_id;
        row.insert(ID_COLUMN.to_string(), Value::from(id));
        table.rows.insert(id, row);
        id
    }
}

fn check_columns(def: &EntityDef, row: &Row) -> Result<(), DatabaseError> {
    match row
        .keys()
        .find(|column| def.field(column).is_none() && !def.is_system_column(column))
    {
        Some(column) => Err(DatabaseError::QueryError(format!(
            "unknown column {}.{}",
            def.table, column
        ))),
        None => Ok(()),
    }
}

fn matches(row: &Row, conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| match row.get(&c.column) {
        Some(value) => value == &c.value,
        None => c.value.is_null(),
    })
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert(&self, def: &EntityDef, row: Row) -> Result<Row, DatabaseError> {
        check_columns(def, &row)?;
        if row.contains_key(ID_COLUMN) {
            return Err(DatabaseError::QueryError("id is assigned by storage".to_string()));
        }

        let mut tables = self.tables.write().await;
        let table = tables.entry(def.table).or_default();

        if let Some(constraint) = table.violated_constraint(def, &row, None) {
            return Err(DatabaseError::UniqueViolation { constraint });
        }

        // Materialize every column like a SQL row would.
        let mut stored = Row::new();
        for field in def.fields {
            stored.insert(field.name.to_string(), Value::Null);
        }
        for field in def.lookup_fields() {
            stored.insert(field.hash_column(), Value::Null);
        }
        if let Some(column) = def.timestamp {
            let now = Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string();
            stored.insert(column.to_string(), Value::String(now));
        }
        stored.extend(row);

        table.next_id += 1;
        let id = table.next_id;
        stored.insert(ID_COLUMN.to_string(), Value::from(id));
        table.rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, def: &EntityDef, id: i64, row: Row) -> Result<Option<Row>, DatabaseError> {
        check_columns(def, &row)?;
        if row.contains_key(ID_COLUMN) {
            return Err(DatabaseError::QueryError("primary key cannot be updated".to_string()));
        }

        let mut tables = self.tables.write().await;
        let table = tables.entry(def.table).or_default();
        if !table.rows.contains_key(&id) {
            return Ok(None);
        }
        if let Some(constraint) = table.violated_constraint(def, &row, Some(id)) {
            return Err(DatabaseError::UniqueViolation { constraint });
        }

        let Some(stored) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        stored.extend(row);
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, def: &EntityDef, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .get_mut(def.table)
            .and_then(|table| table.rows.remove(&id))
            .is_some())
    }

    async fn find(&self, def: &EntityDef, id: i64) -> Result<Option<Row>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.get(def.table).and_then(|table| table.rows.get(&id)).cloned())
    }

    async fn find_where(
        &self,
        def: &EntityDef,
        conditions: &[Condition],
        page: Option<Page>,
    ) -> Result<Vec<Row>, DatabaseError> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(def.table) else {
            return Ok(Vec::new());
        };

        let matching = table.rows.values().filter(|row| matches(row, conditions));
        let rows = match page {
            Some(page) => matching
                .skip(page.offset.max(0) as usize)
                .take(page.limit.max(0) as usize)
                .cloned()
                .collect(),
            None => matching.cloned().collect(),
        };
        Ok(rows)
    }

    async fn count_where(&self, def: &EntityDef, conditions: &[Condition]) -> Result<i64, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(def.table)
            .map(|table| table.rows.values().filter(|row| matches(row, conditions)).count() as i64)
            .unwrap_or(0))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::catalog::{CASOS, USUARIOS};
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn assigns_ids_timestamps_and_null_columns() {
        let store = MemoryStore::new();
        let stored = store
            .insert(&USUARIOS, row(json!({ "nombres": "x", "correo_hash": "h1" })))
            .await
            .unwrap();
        assert_eq!(stored["id"], json!(1));
        assert!(stored["creado_en"].is_string());
        assert_eq!(stored["rol"], Value::Null);

        let second = store.insert(&USUARIOS, row(json!({ "correo_hash": "h2" }))).await.unwrap();
        assert_eq!(second["id"], json!(2));
    }

    #[tokio::test]
    async fn enforces_unique_constraints_by_name() {
        let store = MemoryStore::new();
        store.insert(&USUARIOS, row(json!({ "correo_hash": "same" }))).await.unwrap();
        let err = store
            .insert(&USUARIOS, row(json!({ "correo_hash": "same" })))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation { constraint } if constraint == "usuarios_correo_hash_key"));

        // Nulls never collide.
        store.insert(&USUARIOS, row(json!({ "correo_hash": null }))).await.unwrap();
        store.insert(&USUARIOS, row(json!({ "correo_hash": null }))).await.unwrap();
    }

    #[tokio::test]
    async fn update_checks_uniqueness_against_other_rows() {
        let store = MemoryStore::new();
        store.insert(&CASOS, row(json!({ "codigo_caso": "A-1" }))).await.unwrap();
        store.insert(&CASOS, row(json!({ "codigo_caso": "A-2" }))).await.unwrap();

        assert!(store.update(&CASOS, 1, row(json!({ "codigo_caso": "A-1" }))).await.unwrap().is_some());
        let err = store
            .update(&CASOS, 1, row(json!({ "codigo_caso": "A-2" })))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation { constraint } if constraint == "casos_codigo_caso_key"));
        assert!(store.update(&CASOS, 99, row(json!({ "titulo": "t" }))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn filters_pages_and_deletes() {
        let store = MemoryStore::new();
        for estado in ["Abierto", "Cerrado", "Abierto", "Abierto"] {
            store.insert(&CASOS, row(json!({ "estado": estado }))).await.unwrap();
        }
        let abiertos = [Condition::eq("estado", json!("Abierto"))];
        assert_eq!(store.count_where(&CASOS, &abiertos).await.unwrap(), 3);

        let page = store
            .find_where(&CASOS, &abiertos, Some(Page { limit: 2, offset: 1 }))
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 4]);

        assert!(store.delete(&CASOS, 3).await.unwrap());
        assert!(!store.delete(&CASOS, 3).await.unwrap());
        assert!(store.find(&CASOS, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_unknown_columns() {
        let store = MemoryStore::new();
        let err = store.insert(&USUARIOS, row(json!({ "expediente_id": "x" }))).await.unwrap_err();
        assert!(matches!(err, DatabaseError::QueryError(_)));
    }
}
