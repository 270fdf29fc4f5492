use serde_json::json;

use crate::cli::utils::{output_success, output_value, resolve_encrypted_field};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::encryption::{derive_hash, AttributeCodec, FieldCipher};

pub fn hash(value: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    output_value(output_format, "hash", &derive_hash(value))
}

pub fn encrypt(field: &str, value: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let (def, field) = resolve_encrypted_field(field)?;
    let codec = load_codec()?;

    let sealed = codec.encode(def, field.name, value)?;
    output_value(output_format, "ciphertext", &sealed)
}

pub fn decrypt(field: &str, value: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let (def, field) = resolve_encrypted_field(field)?;
    let codec = load_codec()?;

    match codec.open(def, field.name, value) {
        Ok(opened) => output_success(
            output_format,
            &format!("Decrypted {}.{}", def.table, field.name),
            Some(json!({
                "plaintext": opened.plaintext,
                "key": opened.key.as_str(),
            })),
        ),
        Err(e) => anyhow::bail!("cannot decrypt {}.{} ({}): {}", def.table, field.name, e.reason(), e),
    }
}

fn load_codec() -> anyhow::Result<AttributeCodec> {
    let cipher = FieldCipher::from_env(&config().encryption)?;
    Ok(AttributeCodec::new(cipher).with_fallback_logging(false))
}
