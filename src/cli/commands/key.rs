use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_success, output_value};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::encryption::{AppKey, FieldCipher};

#[derive(Subcommand)]
pub enum KeyCommands {
    #[command(about = "Generate a new application key (base64: form)")]
    Generate,

    #[command(about = "Show the id of the configured key(s); never the key itself")]
    Id,
}

pub fn handle(cmd: KeyCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        KeyCommands::Generate => {
            let key = AppKey::generate();
            match output_format {
                OutputFormat::Text => output_value(output_format, "key", &key.to_config_string()),
                OutputFormat::Json => output_success(
                    output_format,
                    "Generated application key",
                    Some(json!({
                        "key": key.to_config_string(),
                        "key_id": key.key_id(),
                    })),
                ),
            }
        }
        KeyCommands::Id => {
            let encryption = &config().encryption;
            let cipher = FieldCipher::from_env(encryption)?;
            output_success(
                output_format,
                &format!("Key loaded from {}", encryption.key_var),
                Some(json!({
                    "key_id": cipher.key_id(),
                    "previous_key_id": cipher.previous_key_id(),
                })),
            )
        }
    }
}
