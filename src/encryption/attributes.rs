//! Row-level encrypt-on-write / decrypt-on-read.
//!
//! This is the only place rows change between their storage form and their
//! application form. The store never sees plaintext for encrypted fields and
//! callers never see ciphertext.

use serde_json::Value;
use tracing::warn;

use super::cipher::{FieldCipher, Opened};
use super::error::{CryptoError, CryptoResult, DecryptError};
use super::hash::derive_hash;
use crate::entities::{EntityDef, FieldDef, FieldKind, Row, ID_COLUMN};

#[derive(Debug)]
pub struct AttributeCodec {
    cipher: FieldCipher,
    log_fallbacks: bool,
}

impl AttributeCodec {
    pub fn new(cipher: FieldCipher) -> Self {
        Self {
            cipher,
            log_fallbacks: true,
        }
    }

    pub fn with_fallback_logging(mut self, enabled: bool) -> Self {
        self.log_fallbacks = enabled;
        self
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    /// Encrypt one plaintext value for a field of `def`, refusing values that
    /// are already ciphertext under a key this codec holds.
    ///
    /// Used where a value's origin is unknown (operator tooling, backfill).
    pub fn encode(&self, def: &EntityDef, field: &str, plaintext: &str) -> CryptoResult<String> {
        if self.cipher.is_own_ciphertext(plaintext) {
            return Err(CryptoError::AlreadyEncrypted {
                field: def.context(field),
            });
        }
        self.cipher.encrypt(&def.context(field), plaintext)
    }

    /// Decrypt one stored value, falling back to the stored value on failure.
    pub fn decode(&self, def: &EntityDef, field: &str, stored: &str) -> String {
        match self.cipher.decrypt(&def.context(field), stored) {
            Ok(plain) => plain,
            Err(err) => {
                self.report_fallback(def, field, None, &err);
                stored.to_string()
            }
        }
    }

    /// Decrypt one stored value, reporting failures instead of recovering.
    pub fn open(&self, def: &EntityDef, field: &str, stored: &str) -> Result<Opened, DecryptError> {
        self.cipher.open(&def.context(field), stored)
    }

    pub fn hash_of(plaintext: &str) -> String {
        derive_hash(plaintext)
    }

    /// Transform the encryptable keys of an incoming row into storage form.
    ///
    /// Keys absent from `row` are not touched, so a partial update never
    /// nulls unrelated encrypted columns. Null or empty values are stored as
    /// null, and so is their lookup hash. Incoming values are caller
    /// plaintext: text that happens to look like ciphertext is sealed like
    /// any other string.
    pub fn encrypt_on_write(&self, def: &EntityDef, mut row: Row) -> CryptoResult<Row> {
        for field in def.encrypted_fields() {
            let Some(value) = row.remove(field.name) else {
                continue;
            };

            let plaintext = match plaintext_of(field, value)? {
                Some(text) => text,
                None => {
                    row.insert(field.name.to_string(), Value::Null);
                    if field.has_lookup_hash() {
                        row.insert(field.hash_column(), Value::Null);
                    }
                    continue;
                }
            };

            // Hash strictly from the original plaintext, before any transform.
            if field.has_lookup_hash() {
                row.insert(field.hash_column(), Value::String(derive_hash(&plaintext)));
            }
            let sealed = self.cipher.encrypt(&def.context(field.name), &plaintext)?;
            row.insert(field.name.to_string(), Value::String(sealed));
        }
        Ok(row)
    }

    /// Transform a stored row into application form. Never fails.
    pub fn decrypt_on_read(&self, def: &EntityDef, mut row: Row) -> Row {
        let id = row.get(ID_COLUMN).and_then(Value::as_i64);

        for field in def.encrypted_fields() {
            let Some(Value::String(stored)) = row.get(field.name) else {
                continue;
            };

            let plain = match self.cipher.decrypt(&def.context(field.name), stored) {
                Ok(plain) => plain,
                Err(err) => {
                    self.report_fallback(def, field.name, id, &err);
                    continue;
                }
            };

            let value = match field.kind {
                FieldKind::Json => serde_json::from_str(&plain).unwrap_or(Value::String(plain)),
                _ => Value::String(plain),
            };
            row.insert(field.name.to_string(), value);
        }
        row
    }

    fn report_fallback(&self, def: &EntityDef, field: &str, id: Option<i64>, err: &DecryptError) {
        if !self.log_fallbacks {
            return;
        }
        warn!(
            table = def.table,
            field,
            id,
            reason = err.reason(),
            error = %err,
            "decryption failed, returning stored value unchanged"
        );
    }
}

/// Plaintext form of an incoming value, or `None` when it should be stored as null.
fn plaintext_of(field: &FieldDef, value: Value) -> CryptoResult<Option<String>> {
    let text = match (field.kind, value) {
        (_, Value::Null) => return Ok(None),
        (FieldKind::Json, Value::String(s)) if s.trim().is_empty() => return Ok(None),
        (FieldKind::Json, Value::String(s)) => s,
        (FieldKind::Json, other) => serde_json::to_string(&other)?,
        (_, Value::String(s)) => s,
        (_, other) => other.to_string(),
    };

    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::key::{AppKey, KEY_SIZE};
    use crate::entities::catalog::{BITACORA, CLIENTES, REPORTES, USUARIOS};
    use serde_json::json;

    fn codec() -> AttributeCodec {
        AttributeCodec::new(FieldCipher::new(&AppKey::from_bytes([5u8; KEY_SIZE])))
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    #[test]
    fn user_email_is_encrypted_and_hashed() {
        let codec = codec();
        let stored = codec
            .encrypt_on_write(
                &USUARIOS,
                row(json!({ "nombres": "Juan", "correo": "Juan@Test.com", "rol": "Abogado" })),
            )
            .unwrap();

        let correo = stored["correo"].as_str().unwrap();
        assert_ne!(correo, "Juan@Test.com");
        assert!(codec.cipher().is_own_ciphertext(correo));
        assert_eq!(stored["correo_hash"], json!(derive_hash("juan@test.com")));
        assert_eq!(stored["rol"], json!("Abogado"));

        let read = codec.decrypt_on_read(&USUARIOS, stored);
        assert_eq!(read["correo"], json!("Juan@Test.com"));
        assert_eq!(read["nombres"], json!("Juan"));
    }

    #[test]
    fn absent_keys_are_left_alone() {
        let stored = codec()
            .encrypt_on_write(&CLIENTES, row(json!({ "telefono": "999111222" })))
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored.contains_key("direccion"));
        assert!(!stored.contains_key("numero_documento_hash"));
    }

    #[test]
    fn empty_values_become_null_with_null_hash() {
        let stored = codec()
            .encrypt_on_write(
                &CLIENTES,
                row(json!({ "direccion": "", "numero_documento": null })),
            )
            .unwrap();
        assert_eq!(stored["direccion"], Value::Null);
        assert_eq!(stored["numero_documento"], Value::Null);
        assert_eq!(stored["numero_documento_hash"], Value::Null);
    }

    #[test]
    fn legacy_plaintext_reads_back_unchanged() {
        let legacy = row(json!({ "id": 7, "accion": "login", "ip": "10.0.0.1" }));
        let read = codec().decrypt_on_read(&BITACORA, legacy.clone());
        assert_eq!(read, legacy);
    }

    #[test]
    fn encode_refuses_own_ciphertext_only() {
        let codec = codec();
        let sealed = codec.encode(&BITACORA, "accion", "login").unwrap();
        let err = codec.encode(&BITACORA, "accion", &sealed).unwrap_err();
        assert!(matches!(err, CryptoError::AlreadyEncrypted { field } if field == "bitacora.accion"));

        for text in ["enc: ver anexo 3", "enc:v1:abc:def"] {
            let sealed = codec.encode(&BITACORA, "accion", text).unwrap();
            assert_eq!(codec.decode(&BITACORA, "accion", &sealed), text);
        }
    }

    #[test]
    fn marker_like_plaintext_is_sealed_on_write() {
        let codec = codec();
        let stored = codec
            .encrypt_on_write(&BITACORA, row(json!({ "accion": "enc:v1:abc:def", "ip": "enc: nota" })))
            .unwrap();
        assert_ne!(stored["accion"], json!("enc:v1:abc:def"));
        assert!(codec.cipher().is_own_ciphertext(stored["ip"].as_str().unwrap()));

        let read = codec.decrypt_on_read(&BITACORA, stored);
        assert_eq!(read["accion"], json!("enc:v1:abc:def"));
        assert_eq!(read["ip"], json!("enc: nota"));
    }

    #[test]
    fn json_fields_round_trip_as_json() {
        let codec = codec();
        let params = json!({ "desde": "2024-01-01", "estados": ["Abierto", "Cerrado"] });
        let stored = codec
            .encrypt_on_write(&REPORTES, row(json!({ "parametros": params.clone() })))
            .unwrap();
        assert!(stored["parametros"].is_string());

        let read = codec.decrypt_on_read(&REPORTES, stored);
        assert_eq!(read["parametros"], params);
    }

    #[test]
    fn decode_falls_back_and_hash_of_normalizes() {
        let codec = codec();
        assert_eq!(codec.decode(&BITACORA, "ip", "127.0.0.1"), "127.0.0.1");
        let sealed = codec.encode(&BITACORA, "ip", "127.0.0.1").unwrap();
        assert_eq!(codec.decode(&BITACORA, "ip", &sealed), "127.0.0.1");
        assert_eq!(
            AttributeCodec::hash_of(" Juan@Test.com"),
            AttributeCodec::hash_of("juan@test.com")
        );
    }
}
