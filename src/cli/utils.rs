use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::entities::{self, EntityDef, FieldDef};

/// Output a success message in the appropriate format.
/// In text mode `data` is printed as `key: value` lines.
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(Value::Object(fields)) = data {
                if let Value::Object(obj) = &mut response {
                    obj.extend(fields);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(Value::Object(fields)) = data {
                for (key, value) in fields {
                    match value {
                        Value::String(s) => println!("  {}: {}", key, s),
                        other => println!("  {}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}

/// Print a bare value: the raw string in text mode, `{ key: value }` in JSON mode.
/// Text output stays pipe-friendly (e.g. `lexdesk key generate >> .env`).
pub fn output_value(output_format: OutputFormat, key: &str, value: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ key: value }))?),
        OutputFormat::Text => println!("{}", value),
    }
    Ok(())
}

/// Resolve `table.field` to an encrypted catalog field
pub fn resolve_encrypted_field(target: &str) -> anyhow::Result<(&'static EntityDef, &'static FieldDef)> {
    let (table, field) = target
        .split_once('.')
        .ok_or_else(|| anyhow::anyhow!("field must be given as table.field, got '{}'", target))?;
    let def = entities::lookup(table).ok_or_else(|| anyhow::anyhow!("unknown entity '{}'", table))?;
    let field = def
        .field(field)
        .ok_or_else(|| anyhow::anyhow!("unknown field '{}' on {}", field, def.table))?;
    if !field.is_encrypted() {
        anyhow::bail!("{}.{} is not an encrypted field", def.table, field.name);
    }
    Ok((def, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_encrypted_fields_only() {
        let (def, field) = resolve_encrypted_field("usuarios.correo").unwrap();
        assert_eq!((def.table, field.name), ("usuarios", "correo"));

        assert!(resolve_encrypted_field("usuarios").is_err());
        assert!(resolve_encrypted_field("usuarios.rol").is_err());
        assert!(resolve_encrypted_field("usuarios.nope").is_err());
        assert!(resolve_encrypted_field("facturas.numero").is_err());
    }
}
