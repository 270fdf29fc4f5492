//! CRUD, lookup and search over catalog entities.
//!
//! Every write goes validate -> uniqueness pre-check -> secrets hashed ->
//! `encrypt_on_write` -> store. Every read goes store -> `decrypt_on_read`
//! -> [`EntityRecord`]. The store's UNIQUE constraints are the real
//! uniqueness guarantee; the pre-check only yields a friendlier error first.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::database::{Condition, DatabaseError, EntityStore, Page};
use crate::encryption::{derive_hash, hash_password, verify_password, AttributeCodec, CryptoError};
use crate::entities::catalog::USUARIOS;
use crate::entities::validation::{normalize_value, validate, ValidationError};
use crate::entities::{EntityDef, EntityRecord, FieldDef, Row, ID_COLUMN};
use crate::types::Operation;

/// Search term length bounds, in characters.
pub const MIN_SEARCH_LEN: usize = 2;
pub const MAX_SEARCH_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A lookup-hash field collided with an existing row.
    #[error("{field} is already registered")]
    DuplicateHash { field: String },

    /// A plain UNIQUE column collided with an existing row.
    #[error("{field} is already registered")]
    DuplicateValue { field: String },

    /// A reference column points at a row that does not exist.
    #[error("{field} references a record that does not exist")]
    InvalidReference { field: String },

    /// Other rows still point at the record being deleted.
    #[error("{entity} {id} is still referenced by other records")]
    StillReferenced { entity: &'static str, id: i64 },

    #[error("{0} records cannot be modified or deleted")]
    Immutable(&'static str),

    #[error("field '{field}' of {entity} does not support hash lookup")]
    InvalidLookup { entity: &'static str, field: String },

    #[error("{0}")]
    InvalidSearch(String),

    #[error("{0}")]
    InvalidFilter(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// 1-based
    pub page: u32,
    pub per_page: u32,
    /// Raw `column=value` filters from the query string.
    pub filters: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T: Serialize> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Exact match through a `<field>_hash` column.
    HashEquality,
    /// Bounded in-memory decrypt-and-filter.
    DecryptScan,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub strategy: SearchStrategy,
    pub records: Vec<EntityRecord>,
    /// More rows existed than the scan ceiling allowed.
    pub truncated: bool,
    pub rows_scanned: usize,
}

pub struct EntityService {
    store: Arc<dyn EntityStore>,
    codec: Arc<AttributeCodec>,
    max_scan_rows: usize,
}

impl EntityService {
    pub fn new(store: Arc<dyn EntityStore>, codec: Arc<AttributeCodec>, max_scan_rows: usize) -> Self {
        Self {
            store,
            codec,
            max_scan_rows,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn codec(&self) -> &Arc<AttributeCodec> {
        &self.codec
    }

    pub async fn create(&self, def: &'static EntityDef, input: Value) -> ServiceResult<EntityRecord> {
        let row = validate(def, input, Operation::Create, None)?;
        self.check_unique(def, &row, None).await?;

        let row = hash_secrets(def, row)?;
        let stored = self.codec.encrypt_on_write(def, row)?;
        let inserted = self
            .store
            .insert(def, stored)
            .await
            .map_err(|e| write_error(def, e))?;

        debug!(table = def.table, id = ?inserted.get(ID_COLUMN), "created");
        Ok(self.materialize(def, inserted))
    }

    pub async fn get(&self, def: &'static EntityDef, id: i64) -> ServiceResult<EntityRecord> {
        match self.store.find(def, id).await? {
            Some(row) => Ok(self.materialize(def, row)),
            None => Err(ServiceError::NotFound { entity: def.label, id }),
        }
    }

    pub async fn list(&self, def: &'static EntityDef, query: &ListQuery) -> ServiceResult<Paginated<EntityRecord>> {
        let conditions = filter_conditions(def, &query.filters)?;
        let page = query.page.max(1);
        let per_page = query.per_page.max(1);

        let total = self.store.count_where(def, &conditions).await?;
        let rows = self
            .store
            .find_where(
                def,
                &conditions,
                Some(Page {
                    limit: i64::from(per_page),
                    offset: i64::from(page - 1) * i64::from(per_page),
                }),
            )
            .await?;

        let last_page = ((total.max(0) as u64 + u64::from(per_page) - 1) / u64::from(per_page)).max(1) as u32;
        Ok(Paginated {
            data: rows.into_iter().map(|row| self.materialize(def, row)).collect(),
            total,
            page,
            per_page,
            last_page,
        })
    }

    /// Partial update: only keys present in `input` are validated, encrypted and written.
    pub async fn update(&self, def: &'static EntityDef, id: i64, input: Value) -> ServiceResult<EntityRecord> {
        if def.immutable {
            return Err(ServiceError::Immutable(def.label));
        }
        let current = self
            .store
            .find(def, id)
            .await?
            .ok_or(ServiceError::NotFound { entity: def.label, id })?;
        let current = self.codec.decrypt_on_read(def, current);

        let row = validate(def, input, Operation::Update, Some(&current))?;
        self.check_unique(def, &row, Some(id)).await?;

        let row = hash_secrets(def, row)?;
        let stored = self.codec.encrypt_on_write(def, row)?;
        let updated = self
            .store
            .update(def, id, stored)
            .await
            .map_err(|e| write_error(def, e))?
            .ok_or(ServiceError::NotFound { entity: def.label, id })?;

        Ok(self.materialize(def, updated))
    }

    pub async fn delete(&self, def: &'static EntityDef, id: i64) -> ServiceResult<()> {
        if def.immutable {
            return Err(ServiceError::Immutable(def.label));
        }
        let deleted = self.store.delete(def, id).await.map_err(|e| delete_error(def, id, e))?;
        if deleted {
            Ok(())
        } else {
            Err(ServiceError::NotFound { entity: def.label, id })
        }
    }

    /// Equality lookup on an encrypted field through its `<field>_hash` column.
    pub async fn find_by_hash(
        &self,
        def: &'static EntityDef,
        field: &str,
        plaintext: &str,
    ) -> ServiceResult<Option<EntityRecord>> {
        let field = lookup_field(def, field)?;
        let conditions = [Condition::eq(field.hash_column(), Value::String(derive_hash(plaintext)))];
        let mut rows = self
            .store
            .find_where(def, &conditions, Some(Page { limit: 1, offset: 0 }))
            .await?;
        Ok(rows.pop().map(|row| self.materialize(def, row)))
    }

    pub async fn exists_by_hash(&self, def: &'static EntityDef, field: &str, plaintext: &str) -> ServiceResult<bool> {
        Ok(self.find_by_hash(def, field, plaintext).await?.is_some())
    }

    /// Search an entity by a free-text term.
    ///
    /// With `field` naming a lookup-hash field the term must match exactly
    /// (after normalization). Otherwise the first `max_scan_rows` rows are
    /// decrypted and matched case-insensitively by substring over the
    /// searchable fields (or only `field`, when given and searchable).
    pub async fn search(
        &self,
        def: &'static EntityDef,
        term: &str,
        field: Option<&str>,
    ) -> ServiceResult<SearchResult> {
        let term = term.trim();
        let len = term.chars().count();
        if !(MIN_SEARCH_LEN..=MAX_SEARCH_LEN).contains(&len) {
            return Err(ServiceError::InvalidSearch(format!(
                "search term must be between {} and {} characters",
                MIN_SEARCH_LEN, MAX_SEARCH_LEN
            )));
        }

        let fields: Vec<&'static FieldDef> = match field {
            Some(name) => {
                let field = def.field(name).ok_or_else(|| {
                    ServiceError::InvalidSearch(format!("unknown field '{}' for {}", name, def.table))
                })?;
                if field.has_lookup_hash() {
                    let records = self.find_by_hash(def, field.name, term).await?.into_iter().collect();
                    return Ok(SearchResult {
                        strategy: SearchStrategy::HashEquality,
                        records,
                        truncated: false,
                        rows_scanned: 0,
                    });
                }
                if !field.searchable {
                    return Err(ServiceError::InvalidSearch(format!(
                        "field '{}' of {} is not searchable",
                        name, def.table
                    )));
                }
                vec![field]
            }
            None => def.searchable_fields().collect(),
        };

        if fields.is_empty() {
            return Err(ServiceError::InvalidSearch(format!("{} has no searchable fields", def.table)));
        }

        self.scan(def, term, &fields).await
    }

    async fn scan(&self, def: &'static EntityDef, term: &str, fields: &[&'static FieldDef]) -> ServiceResult<SearchResult> {
        let limit = self.max_scan_rows;
        // One extra row tells us whether the ceiling cut the scan short.
        let fetch = i64::try_from(limit).unwrap_or(i64::MAX).saturating_add(1);
        let mut rows = self
            .store
            .find_where(def, &[], Some(Page { limit: fetch, offset: 0 }))
            .await?;
        let truncated = rows.len() > limit;
        rows.truncate(limit);
        let rows_scanned = rows.len();

        warn!(
            table = def.table,
            rows_scanned,
            limit,
            truncated,
            "search over encrypted data decrypts rows in memory"
        );

        let needle = term.to_lowercase();
        let records = rows
            .into_iter()
            .map(|row| self.codec.decrypt_on_read(def, row))
            .filter(|row| {
                fields.iter().any(|f| {
                    row.get(f.name)
                        .and_then(Value::as_str)
                        .is_some_and(|value| value.to_lowercase().contains(&needle))
                })
            })
            .map(|row| EntityRecord::new(def, row))
            .collect();

        Ok(SearchResult {
            strategy: SearchStrategy::DecryptScan,
            records,
            truncated,
            rows_scanned,
        })
    }

    /// Verify a user's credentials. Both unknown emails and wrong passwords
    /// produce the same error.
    pub async fn authenticate(&self, correo: &str, password: &str) -> ServiceResult<EntityRecord> {
        let user = self
            .find_by_hash(&USUARIOS, "correo", correo)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        let stored = user.get_str("password").unwrap_or_default();
        if verify_password(password, stored) {
            Ok(user)
        } else {
            Err(ServiceError::InvalidCredentials)
        }
    }

    fn materialize(&self, def: &'static EntityDef, row: Row) -> EntityRecord {
        EntityRecord::new(def, self.codec.decrypt_on_read(def, row))
    }

    /// Friendly duplicate detection ahead of the insert/update.
    async fn check_unique(&self, def: &'static EntityDef, row: &Row, own_id: Option<i64>) -> ServiceResult<()> {
        for field in def.fields {
            let (column, value) = match row.get(field.name) {
                Some(Value::Null) | None => continue,
                Some(Value::String(plain)) if field.has_lookup_hash() => {
                    (field.hash_column(), Value::String(derive_hash(plain)))
                }
                Some(value) if field.unique => (field.name.to_string(), value.clone()),
                Some(_) => continue,
            };

            let taken = self
                .store
                .find_where(def, &[Condition::eq(column, value)], Some(Page { limit: 2, offset: 0 }))
                .await?
                .iter()
                .any(|existing| existing.get(ID_COLUMN).and_then(Value::as_i64) != own_id);

            if taken {
                return Err(duplicate(field));
            }
        }
        Ok(())
    }
}

fn duplicate(field: &FieldDef) -> ServiceError {
    if field.has_lookup_hash() {
        ServiceError::DuplicateHash {
            field: field.name.to_string(),
        }
    } else {
        ServiceError::DuplicateValue {
            field: field.name.to_string(),
        }
    }
}

/// Map a storage constraint violation back to the field it protects.
fn write_error(def: &EntityDef, err: DatabaseError) -> ServiceError {
    match err {
        DatabaseError::UniqueViolation { constraint } => match def.field_for_constraint(&constraint) {
            Some(field) => duplicate(field),
            None => ServiceError::Database(DatabaseError::UniqueViolation { constraint }),
        },
        DatabaseError::ForeignKeyViolation { constraint } => match def.field_for_foreign_key(&constraint) {
            Some(field) => ServiceError::InvalidReference {
                field: field.name.to_string(),
            },
            None => ServiceError::Database(DatabaseError::ForeignKeyViolation { constraint }),
        },
        other => ServiceError::Database(other),
    }
}

/// A delete can only trip a foreign key from rows that still point here.
fn delete_error(def: &EntityDef, id: i64, err: DatabaseError) -> ServiceError {
    match err {
        DatabaseError::ForeignKeyViolation { constraint } => {
            debug!(table = def.table, id, %constraint, "delete blocked by reference");
            ServiceError::StillReferenced { entity: def.label, id }
        }
        other => ServiceError::Database(other),
    }
}

fn lookup_field(def: &'static EntityDef, name: &str) -> ServiceResult<&'static FieldDef> {
    def.field(name)
        .filter(|f| f.has_lookup_hash())
        .ok_or_else(|| ServiceError::InvalidLookup {
            entity: def.label,
            field: name.to_string(),
        })
}

/// Replace plaintext secrets with their one-way hash.
fn hash_secrets(def: &EntityDef, mut row: Row) -> ServiceResult<Row> {
    for field in def.secret_fields() {
        if let Some(Value::String(plain)) = row.get(field.name) {
            let hashed = hash_password(plain)?;
            row.insert(field.name.to_string(), Value::String(hashed));
        }
    }
    Ok(row)
}

/// Turn query-string filters into storage conditions.
///
/// Lookup-hash fields are compared through their hash column; other
/// encrypted and secret fields cannot be filtered because ciphertext never
/// compares equal.
fn filter_conditions(def: &EntityDef, filters: &[(String, String)]) -> ServiceResult<Vec<Condition>> {
    let mut conditions = Vec::with_capacity(filters.len());
    for (column, raw) in filters {
        if column == ID_COLUMN {
            let id = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ServiceError::InvalidFilter("id must be an integer".to_string()))?;
            conditions.push(Condition::eq(ID_COLUMN, Value::from(id)));
            continue;
        }

        let field = def
            .field(column)
            .ok_or_else(|| ServiceError::InvalidFilter(format!("unknown field '{}' for {}", column, def.table)))?;

        if field.has_lookup_hash() {
            conditions.push(Condition::eq(field.hash_column(), Value::String(derive_hash(raw))));
        } else if field.is_encrypted() || field.is_secret() {
            return Err(ServiceError::InvalidFilter(format!(
                "field '{}' is encrypted and cannot be filtered; use /api/find/{}",
                column, def.table
            )));
        } else {
            let value = normalize_value(field, Value::String(raw.clone()))
                .map_err(|message| ServiceError::InvalidFilter(format!("{}: {}", column, message)))?;
            conditions.push(Condition::eq(field.name, value));
        }
    }
    Ok(conditions)
}
