//! Storage boundary.
//!
//! Stores only ever see rows in storage form: encrypted fields hold
//! ciphertext (or null) and lookup hashes are already derived. Encryption
//! happens above this trait, never inside it.

use async_trait::async_trait;
use serde_json::Value;

use crate::database::manager::DatabaseError;
use crate::entities::{EntityDef, Row};

/// Equality condition on one column. A null value matches SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub value: Value,
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert a row and return it as stored, with `id` and timestamp assigned.
    async fn insert(&self, def: &EntityDef, row: Row) -> Result<Row, DatabaseError>;

    /// Update only the given columns. `None` when the row does not exist.
    async fn update(&self, def: &EntityDef, id: i64, row: Row) -> Result<Option<Row>, DatabaseError>;

    /// `false` when the row does not exist.
    async fn delete(&self, def: &EntityDef, id: i64) -> Result<bool, DatabaseError>;

    async fn find(&self, def: &EntityDef, id: i64) -> Result<Option<Row>, DatabaseError>;

    /// Rows matching every condition, ordered by id.
    async fn find_where(
        &self,
        def: &EntityDef,
        conditions: &[Condition],
        page: Option<Page>,
    ) -> Result<Vec<Row>, DatabaseError>;

    async fn count_where(&self, def: &EntityDef, conditions: &[Condition]) -> Result<i64, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;

    /// Short backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;
}
