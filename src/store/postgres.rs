use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{InsertOutcome, StoreError, TranslationStore};
use crate::i18n::Locale;

/// PostgreSQL-backed translation store.
///
/// Cloning shares the underlying pool, which is also used by the rest of the
/// server. Each call checks out its own connection.
#[derive(Debug, Clone)]
pub struct PgTranslationStore {
    pool: PgPool,
}

impl PgTranslationStore {
    /// Connect to the database
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| classify("connect", e))?;

        Ok(Self::from_pool(pool))
    }

    /// Wrap a pool owned by the hosting application
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables (safe to run always)
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translation (
                key TEXT NOT NULL,
                locale TEXT NOT NULL,
                text TEXT,
                last_synced_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (key, locale)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| classify("migrate", e))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS supported_locale (
                locale TEXT PRIMARY KEY,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| classify("migrate", e))?;

        debug!("Translation tables ready");
        Ok(())
    }

    /// Register configured locales. Existing entries are left alone.
    /// Returns the number of newly registered locales.
    pub async fn register_locales(&self, locales: &[Locale]) -> Result<u64, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify("register_locales", e))?;

        let mut added = 0;
        for locale in locales {
            added += sqlx::query(
                "INSERT INTO supported_locale (locale) VALUES ($1)
                 ON CONFLICT (locale) DO NOTHING",
            )
            .bind(locale.code())
            .execute(&mut *tx)
            .await
            .map_err(|e| classify("register_locales", e))?
            .rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| classify("register_locales", e))?;

        if added > 0 {
            info!("Registered {} new locale(s)", added);
        }
        Ok(added)
    }

    /// Close the pool, waiting for checked-out connections to be returned
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TranslationStore for PgTranslationStore {
    async fn list_supported_locales(&self) -> Result<BTreeSet<Locale>, StoreError> {
        let codes: Vec<String> =
            sqlx::query_scalar("SELECT locale FROM supported_locale ORDER BY locale")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| classify("list_supported_locales", e))?;

        let mut locales = BTreeSet::new();
        for code in codes {
            match Locale::from_code(&code) {
                Ok(locale) => {
                    locales.insert(locale);
                }
                Err(e) => warn!("Skipping supported_locale row: {}", e),
            }
        }
        Ok(locales)
    }

    async fn fetch_existing(&self, locale: &Locale) -> Result<HashSet<String>, StoreError> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM translation WHERE locale = $1")
            .bind(locale.code())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify("fetch_existing", e))?;

        Ok(keys.into_iter().collect())
    }

    async fn insert_missing(
        &self,
        locale: &Locale,
        key: &str,
        default_text: &str,
    ) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            "INSERT INTO translation (key, locale, text, last_synced_at)
             VALUES ($1, $2, NULLIF($3, ''), now())
             ON CONFLICT (key, locale) DO NOTHING",
        )
        .bind(key)
        .bind(locale.code())
        .bind(default_text)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => Ok(InsertOutcome::Inserted),
            Ok(_) => Ok(InsertOutcome::AlreadyPresent),
            Err(e) if is_unique_violation(&e) => {
                debug!("Lost insert race for ({}, {})", key, locale);
                Ok(InsertOutcome::AlreadyPresent)
            }
            Err(e) => Err(classify("insert_missing", e)),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// SQLSTATE codes retrying cannot fix: class 28 (invalid authorization) and
/// 3D000 (database does not exist)
fn is_misconfiguration_code(code: &str) -> bool {
    code.starts_with("28") || code == "3D000"
}

/// Map a sqlx error onto the store taxonomy
fn classify(operation: &'static str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Configuration(_) = &err {
        return StoreError::Misconfigured {
            operation,
            source: Box::new(err),
        };
    }

    if let sqlx::Error::Database(db) = &err {
        if db.code().is_some_and(|code| is_misconfiguration_code(&code)) {
            return StoreError::Misconfigured {
                operation,
                source: Box::new(err),
            };
        }
        if matches!(
            db.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        ) {
            return StoreError::Constraint {
                operation,
                message: db.message().to_string(),
            };
        }
    }

    StoreError::Unavailable {
        operation,
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::DatabaseError;
    use std::borrow::Cow;
    use std::fmt;

    /// Server-side error carrying a SQLSTATE code, as the driver reports it.
    #[derive(Debug)]
    struct ServerError {
        code: &'static str,
        message: &'static str,
    }

    impl fmt::Display for ServerError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{} ({})", self.message, self.code)
        }
    }

    impl std::error::Error for ServerError {}

    impl DatabaseError for ServerError {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.code {
                "23505" => ErrorKind::UniqueViolation,
                "23503" => ErrorKind::ForeignKeyViolation,
                "23502" => ErrorKind::NotNullViolation,
                "23514" => ErrorKind::CheckViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn server_error(code: &'static str, message: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(ServerError { code, message }))
    }

    #[test]
    fn test_unique_violation_is_recognized() {
        let err = server_error("23505", "duplicate key value violates unique constraint");
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_other_constraints_are_not_unique_violations() {
        let err = server_error("23502", "null value in column \"key\"");
        assert!(!is_unique_violation(&err));

        let err = classify("insert_missing", err);
        assert!(matches!(
            err,
            StoreError::Constraint {
                operation: "insert_missing",
                ..
            }
        ));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classify_auth_failure_is_misconfigured() {
        let err = classify(
            "connect",
            server_error("28P01", "password authentication failed for user \"hoot\""),
        );
        assert!(matches!(err, StoreError::Misconfigured { .. }));
        assert!(!err.is_transient());

        let err = classify("connect", server_error("3D000", "database \"hoot\" does not exist"));
        assert!(matches!(err, StoreError::Misconfigured { .. }));
    }

    #[test]
    fn test_classify_configuration_error_is_misconfigured() {
        let err = classify("connect", sqlx::Error::Configuration("invalid port".into()));
        assert!(matches!(err, StoreError::Misconfigured { operation: "connect", .. }));
    }

    #[test]
    fn test_classify_server_shutdown_is_unavailable() {
        let err = classify("fetch_existing", server_error("57P01", "terminating connection"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_pool_timeout_is_unavailable() {
        let err = classify("fetch_existing", sqlx::Error::PoolTimedOut);

        assert!(matches!(
            err,
            StoreError::Unavailable {
                operation: "fetch_existing",
                ..
            }
        ));
    }

    #[test]
    fn test_classify_io_error_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = classify("insert_missing", sqlx::Error::Io(io));

        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert!(err.to_string().contains("reset by peer"));
    }

    #[test]
    fn test_pool_timeout_is_not_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }

    #[tokio::test]
    async fn test_connect_invalid_url_fails_without_retry() {
        let err = PgTranslationStore::connect("not-a-database-url", 1)
            .await
            .expect_err("Malformed URL should not connect");
        assert!(!err.is_transient());
    }

    /// Needs a scratch PostgreSQL database in `DATABASE_URL`.
    #[tokio::test]
    #[ignore]
    async fn test_concurrent_inserts_create_one_row() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PgTranslationStore::connect(&url, 4).await.unwrap();
        store.migrate().await.unwrap();

        let locale = Locale::from_code("fi_FI").unwrap();
        let key = format!("test.race.{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0));

        let (a, b) = tokio::join!(
            store.insert_missing(&locale, &key, "Race"),
            store.insert_missing(&locale, &key, "Race"),
        );
        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o == InsertOutcome::AlreadyPresent);
        assert_eq!(outcomes, vec![InsertOutcome::Inserted, InsertOutcome::AlreadyPresent]);

        let existing = store.fetch_existing(&locale).await.unwrap();
        assert!(existing.contains(&key));

        sqlx::query("DELETE FROM translation WHERE key = $1")
            .bind(&key)
            .execute(&store.pool)
            .await
            .unwrap();
        store.close().await;
    }
}
