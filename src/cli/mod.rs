pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "lexdesk")]
#[command(about = "Lexdesk CLI - Key management, field encryption diagnostics and storage maintenance")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Application key management")]
    Key {
        #[command(subcommand)]
        cmd: commands::key::KeyCommands,
    },

    #[command(about = "Print the lookup hash of a value")]
    Hash {
        #[arg(help = "Plaintext value")]
        value: String,
    },

    #[command(about = "Encrypt a value for a field with the configured key")]
    Encrypt {
        #[arg(long, help = "Target field as table.field")]
        field: String,
        #[arg(help = "Plaintext value")]
        value: String,
    },

    #[command(about = "Decrypt a stored value of a field with the configured key(s)")]
    Decrypt {
        #[arg(long, help = "Source field as table.field")]
        field: String,
        #[arg(help = "Stored value")]
        value: String,
    },

    #[command(about = "Storage maintenance")]
    Db {
        #[command(subcommand)]
        cmd: commands::db::DbCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Key { cmd } => commands::key::handle(cmd, output_format),
        Commands::Hash { value } => commands::crypto::hash(&value, output_format),
        Commands::Encrypt { field, value } => commands::crypto::encrypt(&field, &value, output_format),
        Commands::Decrypt { field, value } => commands::crypto::decrypt(&field, &value, output_format),
        Commands::Db { cmd } => commands::db::handle(cmd, output_format).await,
    }
}
