use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row as _};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::query_builder::{bind_param, QueryBuilder, SqlResult};
use crate::database::store::{Condition, EntityStore, Page};
use crate::entities::{EntityDef, Row};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_rows(&self, sql: &SqlResult) -> Result<Vec<Row>, DatabaseError> {
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn fetch_optional_row(&self, sql: &SqlResult) -> Result<Option<Row>, DatabaseError> {
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        q.fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(decode_row)
            .transpose()
    }
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<Row, DatabaseError> {
    match row.try_get::<Value, _>("row")? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::QueryError(format!(
            "expected a JSON object row, got {}",
            other
        ))),
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn insert(&self, def: &EntityDef, row: Row) -> Result<Row, DatabaseError> {
        let sql = QueryBuilder::new(def).insert(&row)?;
        self.fetch_optional_row(&sql)
            .await?
            .ok_or_else(|| DatabaseError::QueryError(format!("insert into {} returned no row", def.table)))
    }

    async fn update(&self, def: &EntityDef, id: i64, row: Row) -> Result<Option<Row>, DatabaseError> {
        if row.is_empty() {
            return self.find(def, id).await;
        }
        let sql = QueryBuilder::new(def).update(id, &row)?;
        self.fetch_optional_row(&sql).await
    }

    async fn delete(&self, def: &EntityDef, id: i64) -> Result<bool, DatabaseError> {
        let sql = QueryBuilder::new(def).delete(id);
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, def: &EntityDef, id: i64) -> Result<Option<Row>, DatabaseError> {
        let conditions = [Condition::eq(crate::entities::ID_COLUMN, Value::from(id))];
        let sql = QueryBuilder::new(def).select(&conditions, None)?;
        self.fetch_optional_row(&sql).await
    }

    async fn find_where(
        &self,
        def: &EntityDef,
        conditions: &[Condition],
        page: Option<Page>,
    ) -> Result<Vec<Row>, DatabaseError> {
        let sql = QueryBuilder::new(def).select(conditions, page)?;
        self.fetch_rows(&sql).await
    }

    async fn count_where(&self, def: &EntityDef, conditions: &[Condition]) -> Result<i64, DatabaseError> {
        let sql = QueryBuilder::new(def).count(conditions)?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let row = q.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
