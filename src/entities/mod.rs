//! Static entity catalog.
//!
//! Each entity declares its fields once; the encryption layer, validation,
//! storage and the HTTP surface all read the same declaration.

pub mod catalog;
pub mod record;
pub mod validation;

use serde_json::{Map, Value};

pub use catalog::{lookup, ALL};
pub use record::EntityRecord;

/// A row as it crosses the storage boundary.
pub type Row = Map<String, Value>;

/// Column holding the primary key on every table.
pub const ID_COLUMN: &str = "id";

/// Suffix of lookup-hash companion columns.
pub const HASH_SUFFIX: &str = "_hash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text { max: Option<usize> },
    Email { max: usize },
    Password { min: usize },
    Enum(&'static [&'static str]),
    Integer,
    Date,
    DateTime,
    Json,
}

/// How a field is treated at rest and at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Plain,
    /// Ciphertext at rest.
    Encrypted,
    /// Ciphertext at rest plus a `<field>_hash` column for equality lookup.
    EncryptedLookup,
    /// Hashed one-way and never projected.
    Secret,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub protection: Protection,
    pub required: bool,
    /// Plain-column UNIQUE constraint.
    pub unique: bool,
    /// Included in decrypt-scan search.
    pub searchable: bool,
    pub default: Option<&'static str>,
}

impl FieldDef {
    const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            protection: Protection::Plain,
            required: false,
            unique: false,
            searchable: false,
            default: None,
        }
    }

    pub const fn text(name: &'static str, max: usize) -> Self {
        Self::new(name, FieldKind::Text { max: Some(max) })
    }

    pub const fn long_text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text { max: None })
    }

    pub const fn email(name: &'static str, max: usize) -> Self {
        Self::new(name, FieldKind::Email { max })
    }

    pub const fn password(name: &'static str, min: usize) -> Self {
        let mut field = Self::new(name, FieldKind::Password { min });
        field.protection = Protection::Secret;
        field
    }

    pub const fn one_of(name: &'static str, values: &'static [&'static str]) -> Self {
        Self::new(name, FieldKind::Enum(values))
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub const fn date(name: &'static str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub const fn datetime(name: &'static str) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    pub const fn json(name: &'static str) -> Self {
        Self::new(name, FieldKind::Json)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn encrypted(mut self) -> Self {
        self.protection = Protection::Encrypted;
        self
    }

    pub const fn lookup(mut self) -> Self {
        self.protection = Protection::EncryptedLookup;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub const fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.protection, Protection::Encrypted | Protection::EncryptedLookup)
    }

    pub fn has_lookup_hash(&self) -> bool {
        self.protection == Protection::EncryptedLookup
    }

    pub fn is_secret(&self) -> bool {
        self.protection == Protection::Secret
    }

    pub fn hash_column(&self) -> String {
        format!("{}{}", self.name, HASH_SUFFIX)
    }
}

/// Cross-field rule checked against the merged record.
#[derive(Debug, Clone, Copy)]
pub struct RequiredWhen {
    pub field: &'static str,
    pub equals: &'static str,
    pub requires: &'static [&'static str],
    pub message: &'static str,
}

#[derive(Debug)]
pub struct EntityDef {
    pub table: &'static str,
    /// Singular name used in messages.
    pub label: &'static str,
    pub fields: &'static [FieldDef],
    /// Creation timestamp column, filled by storage.
    pub timestamp: Option<&'static str>,
    /// Rows can never be updated or deleted once written.
    pub immutable: bool,
    pub rules: &'static [RequiredWhen],
}

impl EntityDef {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn encrypted_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields.iter().filter(|f| f.is_encrypted())
    }

    pub fn lookup_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields.iter().filter(|f| f.has_lookup_hash())
    }

    pub fn searchable_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields.iter().filter(|f| f.searchable)
    }

    pub fn secret_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields.iter().filter(|f| f.is_secret())
    }

    /// Associated-data context for a field's ciphertext.
    pub fn context(&self, field: &str) -> String {
        format!("{}.{}", self.table, field)
    }

    /// True for columns only the system may write.
    pub fn is_system_column(&self, column: &str) -> bool {
        column == ID_COLUMN
            || self.timestamp == Some(column)
            || self.lookup_fields().any(|f| f.hash_column() == column)
    }

    /// Columns carrying a UNIQUE constraint (hash columns and plain unique fields).
    pub fn unique_columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|f| {
                if f.has_lookup_hash() {
                    Some(f.hash_column())
                } else if f.unique {
                    Some(f.name.to_string())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Name of the UNIQUE constraint on a column, as created by the migrations.
    pub fn constraint_name(&self, column: &str) -> String {
        format!("{}_{}_key", self.table, column)
    }

    /// Column named by a default `<table>_<column>_fkey` constraint on this table.
    pub fn field_for_foreign_key(&self, constraint: &str) -> Option<&'static FieldDef> {
        let column = constraint
            .strip_prefix(self.table)?
            .strip_prefix('_')?
            .strip_suffix("_fkey")?;
        self.field(column)
    }

    /// Resolve a violated constraint back to the field it protects.
    pub fn field_for_constraint(&self, constraint: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| {
            (f.has_lookup_hash() && self.constraint_name(&f.hash_column()) == constraint)
                || (f.unique && self.constraint_name(f.name) == constraint)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_columns_are_system_managed() {
        let usuarios = &catalog::USUARIOS;
        assert!(usuarios.is_system_column("correo_hash"));
        assert!(usuarios.is_system_column("id"));
        assert!(usuarios.is_system_column("creado_en"));
        assert!(!usuarios.is_system_column("correo"));
    }

    #[test]
    fn constraints_map_back_to_fields() {
        let usuarios = &catalog::USUARIOS;
        assert_eq!(usuarios.unique_columns(), vec!["correo_hash".to_string()]);
        let field = usuarios
            .field_for_constraint("usuarios_correo_hash_key")
            .expect("field for constraint");
        assert_eq!(field.name, "correo");

        let casos = &catalog::CASOS;
        assert_eq!(
            casos.field_for_constraint("casos_codigo_caso_key").map(|f| f.name),
            Some("codigo_caso")
        );
        assert!(casos.field_for_constraint("casos_unknown_key").is_none());
    }

    #[test]
    fn foreign_keys_map_to_their_column() {
        let casos = &catalog::CASOS;
        assert_eq!(
            casos.field_for_foreign_key("casos_cliente_id_fkey").map(|f| f.name),
            Some("cliente_id")
        );
        assert!(casos.field_for_foreign_key("documentos_cliente_id_fkey").is_none());
        assert!(casos.field_for_foreign_key("casos_cliente_id_key").is_none());
    }

    #[test]
    fn lookup_fields_are_always_encrypted() {
        for def in ALL {
            for field in def.lookup_fields() {
                assert!(field.is_encrypted(), "{}.{}", def.table, field.name);
            }
        }
    }
}
