//! Translation store gateway.
//!
//! The synchronizer talks to persistence only through [`TranslationStore`].
//! Every call is its own transactional scope; implementations never hold a
//! transaction open between calls.

mod memory;
mod postgres;

pub use memory::MemoryTranslationStore;
pub use postgres::PgTranslationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use thiserror::Error;

use crate::i18n::Locale;

/// A persisted translation of one field into one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRow {
    pub key: String,
    pub locale: String,
    /// `None` until a translator fills it in (or when seeded empty)
    pub text: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

/// Result of a compare-and-insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This call created the row
    Inserted,
    /// A row for (key, locale) already existed, possibly inserted concurrently
    AlreadyPresent,
}

/// Store failures. The synchronizer retries all of them on the next pass;
/// only transient ones are worth retrying when connecting at boot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{operation} failed: store unavailable: {source}")]
    Unavailable {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Bad credentials, unknown database or malformed connection settings
    #[error("{operation} failed: store misconfigured: {source}")]
    Misconfigured {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} violated a constraint: {message}")]
    Constraint {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Unavailable { operation, .. }
            | Self::Misconfigured { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Constraint { operation, .. } => operation,
        }
    }

    /// Connection loss or timeout, as opposed to a rejected statement.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Read/write access to translation rows keyed by (field key, locale).
#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// Locales currently supported. Read fresh on every call.
    async fn list_supported_locales(&self) -> Result<BTreeSet<Locale>, StoreError>;

    /// Keys that already have a row for `locale`.
    async fn fetch_existing(&self, locale: &Locale) -> Result<HashSet<String>, StoreError>;

    /// Insert a row for (key, locale) unless one exists. Never overwrites.
    ///
    /// An empty `default_text` is stored as "not yet translated".
    async fn insert_missing(
        &self,
        locale: &Locale,
        key: &str,
        default_text: &str,
    ) -> Result<InsertOutcome, StoreError>;
}
