//! Bring stored rows up to the current encryption state.
//!
//! Per encrypted field of every row:
//! - legacy plaintext is encrypted with the primary key
//! - ciphertext readable only with the previous key is re-encrypted
//! - missing or stale `<field>_hash` values are recomputed
//!
//! Values that cannot be decrypted at all are counted and left untouched.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::database::{DatabaseError, EntityStore, Page};
use crate::encryption::{derive_hash, AttributeCodec, DecryptError, KeyRole};
use crate::entities::{EntityDef, FieldDef, Row, ID_COLUMN};

use super::entity_service::ServiceResult;

const DEFAULT_BATCH_SIZE: i64 = 200;

#[derive(Debug, Clone, Copy)]
pub struct BackfillOptions {
    /// Count what would change without writing
    pub dry_run: bool,
    pub batch_size: i64,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BackfillReport {
    pub entity: String,
    pub rows_scanned: u64,
    pub rows_updated: u64,
    pub encrypted_legacy: u64,
    pub reencrypted: u64,
    pub hashes_repaired: u64,
    pub undecryptable: u64,
    /// Repaired hashes that collide with another row; left null
    pub conflicts: u64,
}

pub struct BackfillService {
    store: Arc<dyn EntityStore>,
    codec: Arc<AttributeCodec>,
}

impl BackfillService {
    pub fn new(store: Arc<dyn EntityStore>, codec: Arc<AttributeCodec>) -> Self {
        Self { store, codec }
    }

    pub async fn run(&self, def: &'static EntityDef, options: BackfillOptions) -> ServiceResult<BackfillReport> {
        let mut report = BackfillReport {
            entity: def.table.to_string(),
            ..Default::default()
        };
        if def.encrypted_fields().next().is_none() {
            return Ok(report);
        }

        let batch_size = options.batch_size.max(1);
        let mut offset = 0;
        loop {
            let rows = self
                .store
                .find_where(def, &[], Some(Page { limit: batch_size, offset }))
                .await?;
            if rows.is_empty() {
                break;
            }
            offset += rows.len() as i64;

            for row in rows {
                report.rows_scanned += 1;
                let Some(id) = row.get(ID_COLUMN).and_then(Value::as_i64) else {
                    continue;
                };

                let changes = self.plan_row(def, id, &row, &mut report)?;
                if changes.is_empty() {
                    continue;
                }
                report.rows_updated += 1;
                if options.dry_run {
                    continue;
                }

                if !self.write_changes(def, id, changes, &mut report).await? {
                    report.rows_updated -= 1;
                }
            }
        }

        info!(
            table = def.table,
            dry_run = options.dry_run,
            rows_scanned = report.rows_scanned,
            rows_updated = report.rows_updated,
            encrypted_legacy = report.encrypted_legacy,
            reencrypted = report.reencrypted,
            hashes_repaired = report.hashes_repaired,
            undecryptable = report.undecryptable,
            "backfill finished"
        );
        Ok(report)
    }

    pub async fn run_all(
        &self,
        defs: &[&'static EntityDef],
        options: BackfillOptions,
    ) -> ServiceResult<Vec<BackfillReport>> {
        let mut reports = Vec::with_capacity(defs.len());
        for def in defs {
            reports.push(self.run(*def, options).await?);
        }
        Ok(reports)
    }

    /// Write one row's changes. A lookup hash that collides with another row
    /// is left null and the write retried, so the row's values are still
    /// sealed. Returns false when nothing could be written.
    async fn write_changes(
        &self,
        def: &EntityDef,
        id: i64,
        mut changes: Row,
        report: &mut BackfillReport,
    ) -> ServiceResult<bool> {
        loop {
            let constraint = match self.store.update(def, id, changes.clone()).await {
                Ok(_) => return Ok(true),
                Err(DatabaseError::UniqueViolation { constraint }) => constraint,
                Err(e) => return Err(e.into()),
            };
            report.conflicts += 1;

            let column = def
                .field_for_constraint(&constraint)
                .filter(|f| f.has_lookup_hash())
                .map(FieldDef::hash_column)
                .filter(|column| changes.get(column).is_some_and(|v| !v.is_null()));
            let Some(column) = column else {
                warn!(table = def.table, id, %constraint, "backfill skipped row: unique constraint violated");
                return Ok(false);
            };

            warn!(
                table = def.table,
                id,
                %constraint,
                "backfill left lookup hash empty: duplicate value"
            );
            changes.insert(column, Value::Null);
        }
    }

    /// Columns to rewrite for one stored row.
    fn plan_row(&self, def: &EntityDef, id: i64, row: &Row, report: &mut BackfillReport) -> ServiceResult<Row> {
        let mut changes = Row::new();
        for field in def.encrypted_fields() {
            let plaintext = match row.get(field.name) {
                Some(Value::String(stored)) if !stored.is_empty() => {
                    match self.codec.open(def, field.name, stored) {
                        Ok(opened) if opened.key == KeyRole::Primary => opened.plaintext,
                        Ok(opened) => {
                            let sealed = self.codec.encode(def, field.name, &opened.plaintext)?;
                            changes.insert(field.name.to_string(), Value::String(sealed));
                            report.reencrypted += 1;
                            opened.plaintext
                        }
                        Err(DecryptError::NotCiphertext) => {
                            let sealed = self.codec.encode(def, field.name, stored)?;
                            changes.insert(field.name.to_string(), Value::String(sealed));
                            report.encrypted_legacy += 1;
                            stored.clone()
                        }
                        Err(err) => {
                            report.undecryptable += 1;
                            warn!(
                                table = def.table,
                                field = field.name,
                                id,
                                reason = err.reason(),
                                "backfill cannot decrypt value; left untouched"
                            );
                            continue;
                        }
                    }
                }
                _ => {
                    repair_hash(field, row, None, &mut changes, report);
                    continue;
                }
            };
            repair_hash(field, row, Some(&plaintext), &mut changes, report);
        }
        Ok(changes)
    }
}

fn repair_hash(field: &FieldDef, row: &Row, plaintext: Option<&str>, changes: &mut Row, report: &mut BackfillReport) {
    if !field.has_lookup_hash() {
        return;
    }
    let column = field.hash_column();
    let expected = match plaintext {
        Some(plain) => Value::String(derive_hash(plain)),
        None => Value::Null,
    };
    let current = row.get(&column).cloned().unwrap_or(Value::Null);
    if current != expected {
        changes.insert(column, expected);
        report.hashes_repaired += 1;
    }
}
