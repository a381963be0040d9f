//! Boot and shutdown hooks for the translation synchronizer.
//!
//! The hosting server calls [`start_synchronizer`] once its persistence handle
//! is ready and [`stop_synchronizer`] before releasing that handle.

use std::sync::Arc;
use tracing::{error, info};

use crate::i18n::{CatalogError, FieldCatalog};
use crate::store::TranslationStore;
use crate::sync::{SyncSettings, Synchronizer};

/// Initialize the field catalog, then construct and start the synchronizer.
///
/// # Errors
/// Returns `CatalogError` if the field declarations are malformed; the server
/// must not start in that case.
pub fn start_synchronizer(
    store: Arc<dyn TranslationStore>,
    settings: SyncSettings,
) -> Result<Arc<Synchronizer>, CatalogError> {
    let catalog = FieldCatalog::initialize()?;
    let synchronizer = Arc::new(Synchronizer::new(store, catalog, settings));
    synchronizer.start();
    Ok(synchronizer)
}

/// Stop the synchronizer. Errors are logged and never abort server shutdown.
pub async fn stop_synchronizer(synchronizer: &Synchronizer) {
    match synchronizer.shutdown().await {
        Ok(()) => info!("Translation synchronizer shut down cleanly"),
        Err(e) => error!("Error in synchronizer shutdown: {}", e),
    }
}
