use std::sync::Arc;

use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{config, StorageBackend};
use crate::database::DatabaseManager;
use crate::encryption::{AttributeCodec, FieldCipher};
use crate::entities::{self, EntityDef};
use crate::services::{BackfillOptions, BackfillReport, BackfillService};

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Apply pending migrations to DATABASE_URL")]
    Migrate,

    #[command(about = "Encrypt legacy plaintext, re-encrypt rotated values and repair lookup hashes")]
    Backfill {
        #[arg(long, help = "Only this entity (default: every entity)")]
        entity: Option<String>,
        #[arg(long, help = "Report what would change without writing")]
        dry_run: bool,
        #[arg(long, default_value_t = 200, help = "Rows fetched per batch")]
        batch_size: i64,
    },
}

pub async fn handle(cmd: DbCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let database = &config().database;
    if database.backend == StorageBackend::Memory {
        anyhow::bail!("DATABASE_BACKEND=memory has no persistent storage to maintain");
    }

    match cmd {
        DbCommands::Migrate => {
            let pool = DatabaseManager::connect(database).await?;
            DatabaseManager::migrate(&pool).await?;
            output_success(output_format, "Migrations applied", None)
        }
        DbCommands::Backfill {
            entity,
            dry_run,
            batch_size,
        } => {
            let defs: Vec<&'static EntityDef> = match entity.as_deref() {
                Some(name) => {
                    vec![entities::lookup(name).ok_or_else(|| anyhow::anyhow!("unknown entity '{}'", name))?]
                }
                None => entities::ALL.to_vec(),
            };

            let cipher = FieldCipher::from_env(&config().encryption)?;
            let codec = AttributeCodec::new(cipher).with_fallback_logging(false);
            let store = DatabaseManager::open_store(database).await?;

            let service = BackfillService::new(store, Arc::new(codec));
            let options = BackfillOptions { dry_run, batch_size };
            let reports = service.run_all(&defs, options).await?;

            print_reports(&reports, dry_run, output_format)
        }
    }
}

fn print_reports(reports: &[BackfillReport], dry_run: bool, output_format: OutputFormat) -> anyhow::Result<()> {
    let message = if dry_run {
        "Backfill dry run finished (nothing written)"
    } else {
        "Backfill finished"
    };

    match output_format {
        OutputFormat::Json => output_success(output_format, message, Some(json!({ "reports": reports }))),
        OutputFormat::Text => {
            output_success(output_format, message, None)?;
            for r in reports {
                println!(
                    "  {:<18} scanned={} updated={} legacy={} reencrypted={} hashes={} undecryptable={} conflicts={}",
                    r.entity,
                    r.rows_scanned,
                    r.rows_updated,
                    r.encrypted_legacy,
                    r.reencrypted,
                    r.hashes_repaired,
                    r.undecryptable,
                    r.conflicts
                );
            }
            Ok(())
        }
    }
}
