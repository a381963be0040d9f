use anyhow::{bail, Context, Result};
use std::sync::Arc;

use hoot::config::Config;
use hoot::i18n::FieldCatalog;
use hoot::store::PgTranslationStore;
use hoot::sync::Synchronizer;

/// Run a single translation sync pass against the configured database and exit.
/// Exits non-zero if any locale failed, so it can gate deployments.
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("hoot=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let catalog = FieldCatalog::initialize().context("Invalid field declarations")?;

    let store = PgTranslationStore::connect(&config.database_url, 1)
        .await
        .context("Failed to connect to database")?;
    store.migrate().await?;
    store.register_locales(&config.supported_locales).await?;

    let synchronizer = Synchronizer::new(
        Arc::new(store.clone()),
        Arc::clone(&catalog),
        config.sync_settings(),
    );
    let report = synchronizer.run_once().await;
    store.close().await;

    println!("Fields:           {}", catalog.len());
    println!("Locales:          {}", report.locales);
    println!("Rows inserted:    {}", report.inserted);
    println!("Already present:  {}", report.already_present);

    if report.aborted {
        bail!("Could not list supported locales");
    }
    if !report.failed_locales.is_empty() {
        let failed: Vec<_> = report.failed_locales.iter().map(|l| l.code()).collect();
        bail!("Sync failed for locale(s): {}", failed.join(", "));
    }

    println!("✓ Translation store is in sync");
    Ok(())
}
