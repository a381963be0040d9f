use anyhow::{bail, Context, Result};
use std::time::Duration;

use crate::i18n::{parse_locale_list, Locale};
use crate::sync::{SeedPolicy, SyncSettings};

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Server
    pub port: u16,

    // Locales registered at boot
    pub supported_locales: Vec<Locale>,

    // Synchronizer
    pub sync_interval: Duration,
    pub sync_call_timeout: Duration,
    pub sync_shutdown_grace: Duration,
    pub sync_seed_policy: SeedPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let supported_locales = parse_locale_list(
            &std::env::var("SUPPORTED_LOCALES").unwrap_or_else(|_| "en".to_string()),
        )
        .context("SUPPORTED_LOCALES is invalid")?;

        let sync_interval = Duration::from_secs(env_or("SYNC_INTERVAL_SECS", 300)?);
        if sync_interval.is_zero() {
            bail!("SYNC_INTERVAL_SECS must be greater than zero");
        }

        let sync_call_timeout = Duration::from_secs(env_or("SYNC_CALL_TIMEOUT_SECS", 10)?);
        if sync_call_timeout.is_zero() {
            bail!("SYNC_CALL_TIMEOUT_SECS must be greater than zero");
        }

        let sync_seed_policy = match std::env::var("SYNC_SEED_POLICY") {
            Ok(value) => value
                .parse()
                .map_err(anyhow::Error::msg)
                .context("SYNC_SEED_POLICY is invalid")?,
            Err(_) => SeedPolicy::default(),
        };

        Ok(Self {
            // Database
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5)?,

            // Server
            port: env_or("PORT", 8080)?,

            supported_locales,

            // Synchronizer
            sync_interval,
            sync_call_timeout,
            sync_shutdown_grace: Duration::from_secs(env_or("SYNC_SHUTDOWN_GRACE_SECS", 5)?),
            sync_seed_policy,
        })
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            interval: self.sync_interval,
            call_timeout: self.sync_call_timeout,
            shutdown_grace: self.sync_shutdown_grace,
            seed_policy: self.sync_seed_policy,
        }
    }
}

/// Read a numeric variable, falling back to `default` when unset.
/// A set but unparseable value is an error rather than a silent default.
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", name, value)),
        Err(_) => Ok(default),
    }
}
