use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use famstudy_core::config::date_format_from_env_value;
use famstudy_core::constants::DEFAULT_DATA_DIR;
use famstudy_core::{
    convert, Author, ConversionContext, CoreConfig, FamilyIdentifierAllocator, FamilyKey,
    FileRecordStore, MigrationBatchDriver, RecordStore,
};
use pedigree::Pedigree;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "famstudy")]
#[command(about = "Family studies pedigree tooling")]
struct Cli {
    /// Root of the record store
    #[arg(long, env = "FAMSTUDY_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
    /// Author name for Git commits
    #[arg(long, env = "FAMSTUDY_AUTHOR_NAME", default_value = "famstudy cli")]
    author_name: String,
    /// Author email for Git commits
    #[arg(long, env = "FAMSTUDY_AUTHOR_EMAIL", default_value = "cli@famstudy.local")]
    author_email: String,
    /// strftime pattern for dates in converted records (default: %Y-%m-%d)
    #[arg(long, env = "FAMSTUDY_DATE_FORMAT")]
    date_format: Option<String>,
    /// YAML term table for phenotype and disorder lookups
    #[arg(long, env = "FAMSTUDY_ONTOLOGY_FILE")]
    ontology: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a pedigree editor JSON file into internal patient records
    Convert {
        /// Pedigree JSON file
        pedigree: PathBuf,
    },
    /// Print the family key the next migration would allocate
    NextFamilyId,
    /// Print a stored family
    ShowFamily {
        /// Family key, e.g. FAM0000001
        key: String,
    },
    /// Move legacy pedigrees onto family records
    Migrate {
        /// Only report what would happen
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("famstudy=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Arc::new(CoreConfig::new(
        cli.data_dir,
        date_format_from_env_value(cli.date_format)?,
        Author::new(&cli.author_name, &cli.author_email)?,
        cli.ontology.filter(|path| !path.as_os_str().is_empty()),
    )?);

    match cli.command {
        Some(Commands::Convert { pedigree }) => {
            let terms = cfg.term_table()?;
            let text = std::fs::read_to_string(&pedigree)?;
            let document = Pedigree::parse(&text)?;
            let ctx = ConversionContext::new(&terms, cfg.date_format());
            let records: Vec<Value> = convert(&document, &ctx)
                .iter()
                .map(|record| record.to_json())
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Some(Commands::NextFamilyId) => {
            let store = FileRecordStore::new(Arc::clone(&cfg));
            match FamilyIdentifierAllocator::new(&store).next_key() {
                Ok(key) => println!("{}", key),
                Err(e) => eprintln!("Error reading family identifiers: {}", e),
            }
        }
        Some(Commands::ShowFamily { key }) => {
            let Some(key) = FamilyKey::parse(&key) else {
                eprintln!("Not a family key: {}", key);
                return Ok(());
            };
            let store = FileRecordStore::new(Arc::clone(&cfg));
            match store.load_family(&key) {
                Ok(Some(family)) => println!("{}", serde_json::to_string_pretty(&family)?),
                Ok(None) => println!("No family found with key {}", key),
                Err(e) => eprintln!("Error loading family {}: {}", key, e),
            }
        }
        Some(Commands::Migrate { dry_run }) => {
            let store = FileRecordStore::new(Arc::clone(&cfg));
            let driver = MigrationBatchDriver::new(&store);
            if dry_run {
                let preview = driver.preview()?;
                println!(
                    "Would migrate: {}, would skip: {}, unreadable: {}",
                    preview.would_migrate, preview.would_skip, preview.unreadable
                );
            } else {
                let _lock = store.acquire_migration_lock()?;
                let report = driver.run()?;
                for failure in &report.failures {
                    eprintln!("Failed {}: {}", failure.patient_id, failure.cause);
                }
                println!(
                    "Migrated: {}, skipped: {}, failed: {}",
                    report.migrated, report.skipped, report.failed
                );
            }
        }
        None => {
            println!("Use 'famstudy --help' for commands");
        }
    }

    Ok(())
}
