use serde_json::Value;
use sqlx::postgres::PgArguments;

use crate::database::manager::DatabaseError;
use crate::database::store::{Condition, Page};
use crate::entities::{EntityDef, FieldKind, Row, ID_COLUMN};

const ALIAS: &str = "r";

/// Generated SQL plus its positional parameters.
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// Builds parameterized statements for one entity table.
///
/// Identifiers are only ever taken from the entity catalog and are quoted;
/// values are always bound. Every placeholder carries an explicit cast so
/// NULLs and text-encoded dates bind regardless of the column type.
pub struct QueryBuilder<'a> {
    def: &'a EntityDef,
    params: Vec<Value>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(def: &'a EntityDef) -> Self {
        Self { def, params: Vec::new() }
    }

    pub fn insert(mut self, row: &Row) -> Result<SqlResult, DatabaseError> {
        let table = quote_identifier(self.def.table);
        if row.is_empty() {
            return Ok(self.finish(format!(
                "INSERT INTO {} AS {} DEFAULT VALUES RETURNING row_to_json({}) AS row",
                table, ALIAS, ALIAS
            )));
        }

        let mut columns = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());
        for (column, value) in row {
            let cast = self.cast_for(column)?;
            columns.push(quote_identifier(column));
            values.push(self.param(value.clone(), cast));
        }

        let query = format!(
            "INSERT INTO {} AS {} ({}) VALUES ({}) RETURNING row_to_json({}) AS row",
            table,
            ALIAS,
            columns.join(", "),
            values.join(", "),
            ALIAS
        );
        Ok(self.finish(query))
    }

    /// Update only the provided columns. Callers handle the empty case.
    pub fn update(mut self, id: i64, row: &Row) -> Result<SqlResult, DatabaseError> {
        if row.is_empty() {
            return Err(DatabaseError::QueryError("update without columns".to_string()));
        }

        let mut assignments = Vec::with_capacity(row.len());
        for (column, value) in row {
            if column == ID_COLUMN {
                return Err(DatabaseError::QueryError("primary key cannot be updated".to_string()));
            }
            let cast = self.cast_for(column)?;
            let placeholder = self.param(value.clone(), cast);
            assignments.push(format!("{} = {}", quote_identifier(column), placeholder));
        }
        let id_param = self.param(Value::from(id), "bigint");

        let query = format!(
            "UPDATE {} AS {} SET {} WHERE {}.{} = {} RETURNING row_to_json({}) AS row",
            quote_identifier(self.def.table),
            ALIAS,
            assignments.join(", "),
            ALIAS,
            quote_identifier(ID_COLUMN),
            id_param,
            ALIAS
        );
        Ok(self.finish(query))
    }

    pub fn delete(mut self, id: i64) -> SqlResult {
        let id_param = self.param(Value::from(id), "bigint");
        let query = format!(
            "DELETE FROM {} WHERE {} = {}",
            quote_identifier(self.def.table),
            quote_identifier(ID_COLUMN),
            id_param
        );
        self.finish(query)
    }

    pub fn select(mut self, conditions: &[Condition], page: Option<Page>) -> Result<SqlResult, DatabaseError> {
        let where_sql = self.where_clause(conditions)?;
        let mut query = format!(
            "SELECT row_to_json({}) AS row FROM {} AS {}{} ORDER BY {}.{}",
            ALIAS,
            quote_identifier(self.def.table),
            ALIAS,
            where_sql,
            ALIAS,
            quote_identifier(ID_COLUMN)
        );
        if let Some(page) = page {
            let limit = self.param(Value::from(page.limit), "bigint");
            let offset = self.param(Value::from(page.offset), "bigint");
            query.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }
        Ok(self.finish(query))
    }

    pub fn count(mut self, conditions: &[Condition]) -> Result<SqlResult, DatabaseError> {
        let where_sql = self.where_clause(conditions)?;
        let query = format!(
            "SELECT COUNT(*) AS count FROM {} AS {}{}",
            quote_identifier(self.def.table),
            ALIAS,
            where_sql
        );
        Ok(self.finish(query))
    }

    fn where_clause(&mut self, conditions: &[Condition]) -> Result<String, DatabaseError> {
        if conditions.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let cast = self.cast_for(&condition.column)?;
            let column = format!("{}.{}", ALIAS, quote_identifier(&condition.column));
            if condition.value.is_null() {
                parts.push(format!("{} IS NULL", column));
            } else {
                let placeholder = self.param(condition.value.clone(), cast);
                parts.push(format!("{} = {}", column, placeholder));
            }
        }
        Ok(format!(" WHERE {}", parts.join(" AND ")))
    }

    /// Postgres type of a catalog column. Unknown columns are rejected.
    fn cast_for(&self, column: &str) -> Result<&'static str, DatabaseError> {
        if column == ID_COLUMN {
            return Ok("bigint");
        }
        if self.def.timestamp == Some(column) {
            return Ok("timestamp");
        }
        if self.def.lookup_fields().any(|f| f.hash_column() == column) {
            return Ok("text");
        }
        let field = self.def.field(column).ok_or_else(|| {
            DatabaseError::QueryError(format!("unknown column {}.{}", self.def.table, column))
        })?;
        Ok(match field.kind {
            _ if field.is_encrypted() => "text",
            FieldKind::Integer => "bigint",
            FieldKind::Date => "date",
            FieldKind::DateTime => "timestamp",
            FieldKind::Json => "jsonb",
            FieldKind::Text { .. } | FieldKind::Email { .. } | FieldKind::Password { .. } | FieldKind::Enum(_) => "text",
        })
    }

    fn param(&mut self, value: Value, cast: &str) -> String {
        self.params.push(value);
        format!("${}::{}", self.params.len(), cast)
    }

    fn finish(self, query: String) -> SqlResult {
        SqlResult { query, params: self.params }
    }
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
