//! ndb CLI - local registry of network devices
//!
//! This binary is the command surface over `ndb-core`:
//! - Store raw device records in the content store
//! - Refresh the device table from stored `sys=` descriptors
//! - List and query known devices

mod render;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use ndb_core::{Database, Filters, config};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ndb")]
#[command(author = "ndb contributors")]
#[command(version)]
#[command(about = "ndb - a network database")]
#[command(long_about = "
ndb keeps a local registry of devices found on your LAN. Raw records go
into an append-only content store; lines starting with `sys=` describe a
device and are reconciled into the device table by `ndb db refresh`.

Quick start:
  1. Create the database:  ndb db init
  2. Store a descriptor:   ndb cas put --text 'sys=feather-a id=cp-001 ip=192.168.0.10 category=cp'
  3. Rebuild devices:      ndb db refresh
  4. Look it up:           ndb query ip=192.168.0.10
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the SQLite database (overrides NDB_DB_PATH and config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Database related commands
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// Content store commands
    Cas {
        #[command(subcommand)]
        command: CasCommand,
    },

    /// Store every record line of a .ndb file
    Ingest {
        /// File with one record per line (# comments and blank lines ignored)
        file: PathBuf,
    },

    /// List known devices
    Ls {
        /// Print raw `sys` records from the content store instead
        #[arg(long)]
        raw: bool,
    },

    /// Query devices by example
    Query {
        /// field=value filters (e.g. ip=1.2.3.4 category=cp)
        #[arg(required = true, value_name = "FIELD=VALUE")]
        pairs: Vec<String>,
    },

    /// Show the raw record a device was derived from
    Get {
        /// Device id
        id: String,
    },

    /// Show configuration paths and settings
    Config,
}

#[derive(Subcommand)]
pub enum DbCommand {
    /// Initialize the local database
    Init,

    /// Show database health report
    Status {
        /// Include hashes of records not backing any device
        #[arg(long)]
        show_orphans: bool,
    },

    /// Rebuild the devices table from `sys=` records
    Refresh,
}

#[derive(Subcommand)]
pub enum CasCommand {
    /// Store content and print its id and hash (reads stdin without --text/--file)
    Put {
        /// Content string
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Path to a file with the content
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Retrieve content by hash or hash prefix
    Get {
        /// Hash or prefix, optionally @-prefixed
        key: String,

        /// Print @hash before each record
        #[arg(long)]
        show_hash: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ndb={},ndb_core={}", log_level, log_level).into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config(cli.db.as_deref());
    tracing::debug!("Database: {:?} (from {})", config.db_path, config.source);

    match &cli.command {
        Commands::Db { command } => match command {
            DbCommand::Init => cmd_db_init(&cli, &config.db_path),
            DbCommand::Status { show_orphans } => {
                cmd_db_status(&cli, &config.db_path, *show_orphans)
            }
            DbCommand::Refresh => cmd_db_refresh(&cli, &config.db_path),
        },
        Commands::Cas { command } => match command {
            CasCommand::Put { text, file } => {
                cmd_cas_put(&cli, &config.db_path, text.as_deref(), file.as_deref())
            }
            CasCommand::Get { key, show_hash } => {
                cmd_cas_get(&cli, &config.db_path, key, *show_hash)
            }
        },
        Commands::Ingest { file } => cmd_ingest(&cli, &config.db_path, file),
        Commands::Ls { raw } => cmd_ls(&cli, &config.db_path, *raw),
        Commands::Query { pairs } => cmd_query(&cli, &config.db_path, pairs),
        Commands::Get { id } => cmd_get(&cli, &config.db_path, id),
        Commands::Config => cmd_config(&cli, &config),
    }
}

fn open_db(path: &Path) -> Result<Database> {
    Database::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn cmd_db_init(cli: &Cli, path: &Path) -> Result<()> {
    let db = open_db(path)?;
    let version = db.schema_version()?;

    match cli.format {
        OutputFormat::Text => println!("Initialized database at {}", path.display()),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "path": path.display().to_string(),
                "schema_version": version,
            }));
        }
    }
    Ok(())
}

fn cmd_db_status(cli: &Cli, path: &Path, show_orphans: bool) -> Result<()> {
    let db = open_db(path)?;
    let report = db.status()?;

    match cli.format {
        OutputFormat::Text => {
            println!("Database:    {}", report.path);
            println!("Devices:     {}", report.devices);
            println!("Records:     {}", report.records);
            println!("Descriptors: {}", report.descriptors);
            println!("Orphans:     {}", report.orphans.len());
            if cli.verbose && !report.device_hashes.is_empty() {
                println!("Device hashes:");
                for hash in &report.device_hashes {
                    println!("- {}", hash);
                }
            }
            if (show_orphans || cli.verbose) && !report.orphans.is_empty() {
                println!("Orphan hashes:");
                for hash in &report.orphans {
                    println!("- {}", hash);
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn cmd_db_refresh(cli: &Cli, path: &Path) -> Result<()> {
    let mut db = open_db(path)?;
    let summary = db.refresh().context("Refresh failed")?;

    match cli.format {
        OutputFormat::Text => {
            println!(
                "Scanned {}, upserted {}, skipped {}",
                summary.scanned, summary.upserted, summary.skipped
            );
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(&summary)?),
    }
    Ok(())
}

fn cmd_cas_put(cli: &Cli, path: &Path, text: Option<&str>, file: Option<&Path>) -> Result<()> {
    let content = match (text, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(file)) => std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read content from stdin")?;
            buf
        }
    };

    let db = open_db(path)?;
    let id = db.put(&content)?;
    let hash = ndb_core::cas::hash_content(&content);

    match cli.format {
        OutputFormat::Text => println!("{} @{}", id, hash),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "id": id,
                "hash": hash,
            }));
        }
    }
    Ok(())
}

fn cmd_cas_get(cli: &Cli, path: &Path, key: &str, show_hash: bool) -> Result<()> {
    let db = open_db(path)?;
    let records = db.cas_get(key)?;
    if records.is_empty() {
        bail!("Not found: {}", key);
    }

    match cli.format {
        OutputFormat::Text => render::print_contents(&records, show_hash),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
    }
    Ok(())
}

fn cmd_ingest(cli: &Cli, path: &Path, file: &Path) -> Result<()> {
    let db = open_db(path)?;
    let ids = ndb_core::ingest::ingest_file(&db, file)
        .with_context(|| format!("Failed to ingest {}", file.display()))?;

    match cli.format {
        OutputFormat::Text => println!("Stored {} records", ids.len()),
        OutputFormat::Json => println!("{}", serde_json::json!({ "ids": ids })),
    }
    Ok(())
}

fn cmd_ls(cli: &Cli, path: &Path, raw: bool) -> Result<()> {
    let db = open_db(path)?;

    if raw {
        let records = db
            .list_raw("sys")
            .iter()
            .collect::<ndb_core::Result<Vec<_>>>()?;
        match cli.format {
            OutputFormat::Text => render::print_contents(&records, false),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        }
        return Ok(());
    }

    let devices = db.devices()?;
    render::print_devices(&devices, cli.format)
}

fn cmd_query(cli: &Cli, path: &Path, pairs: &[String]) -> Result<()> {
    let filters = Filters::parse(pairs)?;
    let db = open_db(path)?;
    let devices = db.query(&filters)?;
    render::print_devices(&devices, cli.format)
}

fn cmd_get(cli: &Cli, path: &Path, id: &str) -> Result<()> {
    let db = open_db(path)?;
    let Some(record) = db.device_source(id)? else {
        bail!("Not found: {}", id);
    };

    match cli.format {
        OutputFormat::Text => render::print_contents(std::slice::from_ref(&record), false),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
    }
    Ok(())
}

fn cmd_config(cli: &Cli, config: &ndb_core::NdbConfig) -> Result<()> {
    let config_path = config::get_config_file_path_string();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file: {}", config_path);
            println!("Database:    {} (from {})", config.db_path.display(), config.source);
            println!();
            println!("Environment variables:");
            println!("  NDB_DB_PATH - Override database path");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", config::generate_example_config());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "config_file": config_path,
                "db_path": config.db_path.display().to_string(),
                "db_source": config.source.to_string(),
            }));
        }
    }
    Ok(())
}
