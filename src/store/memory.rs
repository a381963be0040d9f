use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tokio::sync::Mutex;

use super::{InsertOutcome, StoreError, TranslationRow, TranslationStore};
use crate::i18n::Locale;

/// In-process translation store with the same contract as the PostgreSQL one.
///
/// Rows are keyed by (locale, key); inserts compare-and-insert under one lock,
/// so concurrent callers for the same pair leave exactly one row.
#[derive(Debug, Default)]
pub struct MemoryTranslationStore {
    locales: Mutex<BTreeSet<Locale>>,
    rows: Mutex<BTreeMap<(String, String), TranslationRow>>,
}

impl MemoryTranslationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locales<I>(locales: I) -> Self
    where
        I: IntoIterator<Item = Locale>,
    {
        Self {
            locales: Mutex::new(locales.into_iter().collect()),
            rows: Mutex::default(),
        }
    }

    /// Add a supported locale. Returns false if it was already present.
    pub async fn add_locale(&self, locale: Locale) -> bool {
        self.locales.lock().await.insert(locale)
    }

    /// Set a row's text as a translator would, creating the row if needed.
    pub async fn set_text(&self, locale: &Locale, key: &str, text: &str) {
        let mut rows = self.rows.lock().await;
        rows.entry((locale.code().to_string(), key.to_string()))
            .and_modify(|row| row.text = Some(text.to_string()))
            .or_insert_with(|| TranslationRow {
                key: key.to_string(),
                locale: locale.code().to_string(),
                text: Some(text.to_string()),
                last_synced_at: Utc::now(),
            });
    }

    /// Look up a single row.
    pub async fn get(&self, locale: &Locale, key: &str) -> Option<TranslationRow> {
        let rows = self.rows.lock().await;
        rows.get(&(locale.code().to_string(), key.to_string()))
            .cloned()
    }

    /// Snapshot of all rows, ordered by (locale, key).
    pub async fn rows(&self) -> Vec<TranslationRow> {
        self.rows.lock().await.values().cloned().collect()
    }

    pub async fn row_count(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl TranslationStore for MemoryTranslationStore {
    async fn list_supported_locales(&self) -> Result<BTreeSet<Locale>, StoreError> {
        Ok(self.locales.lock().await.clone())
    }

    async fn fetch_existing(&self, locale: &Locale) -> Result<HashSet<String>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .filter(|row| row.locale == locale.code())
            .map(|row| row.key.clone())
            .collect())
    }

    async fn insert_missing(
        &self,
        locale: &Locale,
        key: &str,
        default_text: &str,
    ) -> Result<InsertOutcome, StoreError> {
        let mut rows = self.rows.lock().await;
        let id = (locale.code().to_string(), key.to_string());

        if rows.contains_key(&id) {
            return Ok(InsertOutcome::AlreadyPresent);
        }

        rows.insert(
            id,
            TranslationRow {
                key: key.to_string(),
                locale: locale.code().to_string(),
                text: (!default_text.is_empty()).then(|| default_text.to_string()),
                last_synced_at: Utc::now(),
            },
        );
        Ok(InsertOutcome::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn locale(code: &str) -> Locale {
        Locale::from_code(code).unwrap()
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = MemoryTranslationStore::new();

        assert!(store.list_supported_locales().await.unwrap().is_empty());
        assert_eq!(store.row_count().await, 0);
    }

    #[tokio::test]
    async fn test_with_locales() {
        let store = MemoryTranslationStore::with_locales([locale("en"), locale("fr")]);

        let locales = store.list_supported_locales().await.unwrap();
        assert_eq!(locales.len(), 2);
        assert!(locales.contains(&locale("fr")));
    }

    #[tokio::test]
    async fn test_add_locale_reports_new() {
        let store = MemoryTranslationStore::new();

        assert!(store.add_locale(locale("de")).await);
        assert!(!store.add_locale(locale("de")).await);
    }

    #[tokio::test]
    async fn test_insert_missing_creates_row() {
        let store = MemoryTranslationStore::new();
        let fr = locale("fr");

        let outcome = store.insert_missing(&fr, "welcome.title", "Welcome").await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let row = store.get(&fr, "welcome.title").await.expect("Row should exist");
        assert_eq!(row.text.as_deref(), Some("Welcome"));
        assert_eq!(row.locale, "fr");
    }

    #[tokio::test]
    async fn test_insert_missing_empty_text_is_untranslated() {
        let store = MemoryTranslationStore::new();
        let fr = locale("fr");

        store.insert_missing(&fr, "welcome.title", "").await.unwrap();

        let row = store.get(&fr, "welcome.title").await.unwrap();
        assert!(row.text.is_none());
    }

    #[tokio::test]
    async fn test_insert_missing_never_overwrites() {
        let store = MemoryTranslationStore::new();
        let fr = locale("fr");
        store.set_text(&fr, "welcome.title", "Bienvenue").await;

        let outcome = store.insert_missing(&fr, "welcome.title", "Welcome").await.unwrap();
        assert_eq!(outcome, InsertOutcome::AlreadyPresent);

        let row = store.get(&fr, "welcome.title").await.unwrap();
        assert_eq!(row.text.as_deref(), Some("Bienvenue"));
    }

    #[tokio::test]
    async fn test_fetch_existing_is_per_locale() {
        let store = MemoryTranslationStore::new();
        store.insert_missing(&locale("en"), "a", "A").await.unwrap();
        store.insert_missing(&locale("en"), "b", "B").await.unwrap();
        store.insert_missing(&locale("fr"), "a", "A").await.unwrap();

        let en = store.fetch_existing(&locale("en")).await.unwrap();
        let fr = store.fetch_existing(&locale("fr")).await.unwrap();
        let de = store.fetch_existing(&locale("de")).await.unwrap();

        assert_eq!(en.len(), 2);
        assert_eq!(fr, HashSet::from(["a".to_string()]));
        assert!(de.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_leave_one_row() {
        let store = Arc::new(MemoryTranslationStore::new());
        let fr = locale("fr");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let fr = fr.clone();
                tokio::spawn(async move {
                    store
                        .insert_missing(&fr, "welcome.title", &format!("Welcome {}", i))
                        .await
                })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(store.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_rows_ordered_by_locale_then_key() {
        let store = MemoryTranslationStore::new();
        store.insert_missing(&locale("fr"), "b", "B").await.unwrap();
        store.insert_missing(&locale("en"), "b", "B").await.unwrap();
        store.insert_missing(&locale("en"), "a", "A").await.unwrap();

        let order: Vec<_> = store
            .rows()
            .await
            .into_iter()
            .map(|row| (row.locale, row.key))
            .collect();
        assert_eq!(
            order,
            vec![
                ("en".to_string(), "a".to_string()),
                ("en".to_string(), "b".to_string()),
                ("fr".to_string(), "b".to_string()),
            ]
        );
    }
}
