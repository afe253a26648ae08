//! Command-line ingestion entry point.
//!
//! # Responsibility
//! - Read one vCard file and import it atomically for an owner.
//! - List committed contacts for quick local inspection.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use minidrive_core::db::open_db;
use minidrive_core::{
    default_log_level, init_logging, parse_document, ContactRepository, ImportService,
    SqliteContactRepository,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "minidrive")]
#[command(about = "Import vCard address books into the Minidrive contact store")]
#[command(version)]
struct Args {
    /// SQLite database file
    #[arg(long, global = true, env = "MINIDRIVE_DB", default_value = "minidrive.sqlite3")]
    db: PathBuf,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, global = true, env = "MINIDRIVE_LOG_DIR")]
    log_dir: Option<String>,

    /// Log level (trace|debug|info|warn|error); needs --log-dir
    #[arg(long, global = true, env = "MINIDRIVE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import every contact of a .vcf file, all or nothing
    Import {
        /// vCard document to import
        file: PathBuf,
        /// Owner the contacts are stored for
        #[arg(long, env = "MINIDRIVE_OWNER")]
        owner: String,
        /// Parse and print without writing to the database
        #[arg(long)]
        dry_run: bool,
        /// Print the imported contacts as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print stored contacts of an owner as JSON
    List {
        #[arg(long, env = "MINIDRIVE_OWNER")]
        owner: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(log_dir) = args.log_dir.as_deref() {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).map_err(anyhow::Error::msg)?;
    } else if let Some(level) = ignored_log_level(&args) {
        eprintln!("warning: log level `{level}` ignored; set --log-dir to enable logging");
    }

    match args.command {
        Command::Import {
            file,
            owner,
            dry_run,
            json,
        } => {
            let document = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let contacts = if dry_run {
                parse_document(&document).context("Import failed")?
            } else {
                let mut conn = open_db(&args.db)
                    .with_context(|| format!("Failed to open {}", args.db.display()))?;
                let repo = SqliteContactRepository::try_new(&mut conn)?;
                let mut service = ImportService::new(repo);
                service
                    .import_document(&owner, &document)
                    .context("Import failed")?
                    .contacts
            };

            info!(
                "event=cli_import module=cli status=ok dry_run={} contacts={}",
                dry_run,
                contacts.len()
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&contacts)?);
            } else if dry_run {
                println!("parsed {} contacts (dry run, nothing stored)", contacts.len());
            } else {
                println!("imported {} contacts for {}", contacts.len(), owner);
            }
        }
        Command::List { owner } => {
            let mut conn = open_db(&args.db)
                .with_context(|| format!("Failed to open {}", args.db.display()))?;
            let repo = SqliteContactRepository::try_new(&mut conn)?;
            let records = repo.list_contacts(&owner)?;
            info!("event=cli_list module=cli status=ok contacts={}", records.len());
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}

/// Level requested while file logging stays off.
fn ignored_log_level(args: &Args) -> Option<&str> {
    match args.log_dir {
        Some(_) => None,
        None => args.log_level.as_deref(),
    }
}
