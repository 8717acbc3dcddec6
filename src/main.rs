use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use famstudy_core::constants::{DEFAULT_DATA_DIR, DEFAULT_DATE_FORMAT};
use famstudy_core::{Author, CoreConfig, FileRecordStore, MigrationBatchDriver};

/// Runs the pedigree-to-family migration over the configured record store.
///
/// The run holds the store's migration lock for its whole duration, so two runners pointed at
/// the same data directory cannot allocate family identifiers at the same time. Date format and
/// term table settings belong to `famstudy convert` and are not read here.
///
/// # Environment Variables
/// - `FAMSTUDY_DATA_DIR`: Root of the record store (default: "record_data")
/// - `FAMSTUDY_AUTHOR_NAME`: Commit author name (default: "famstudy migration")
/// - `FAMSTUDY_AUTHOR_EMAIL`: Commit author email (default: "migration@famstudy.local")
///
/// # Returns
/// * `Ok(())` - If the run completed, even when some records failed
/// * `Err(anyhow::Error)` - If configuration is invalid or the store could not be read
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("famstudy=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = std::env::var("FAMSTUDY_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let author = Author::new(
        std::env::var("FAMSTUDY_AUTHOR_NAME").unwrap_or_else(|_| "famstudy migration".into()),
        std::env::var("FAMSTUDY_AUTHOR_EMAIL")
            .unwrap_or_else(|_| "migration@famstudy.local".into()),
    )?;

    let cfg = Arc::new(CoreConfig::new(
        PathBuf::from(data_dir),
        DEFAULT_DATE_FORMAT.to_string(),
        author,
        None,
    )?);

    tracing::info!("++ Migrating pedigrees in {}", cfg.data_dir().display());

    let store = FileRecordStore::new(cfg);
    let _lock = store.acquire_migration_lock()?;

    let report = MigrationBatchDriver::new(&store).run()?;
    for failure in &report.failures {
        tracing::error!(
            patient_id = %failure.patient_id,
            error = %failure.cause,
            "record was not migrated"
        );
    }
    tracing::info!(
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.failed,
        "migration finished"
    );

    Ok(())
}
