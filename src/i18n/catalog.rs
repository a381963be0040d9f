//! Field catalog: single source of truth for which translation keys must exist.
//!
//! The catalog is built once from the static declarations in
//! [`crate::i18n::fields`] and kept in a `OnceLock`. After initialization it is
//! read-only and shared through an `Arc`, so readers never lock.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::info;

use super::fields;

/// A translatable field and its source-locale text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Stable dotted identifier (e.g. "entry.basename")
    pub key: &'static str,

    /// Text in the source locale, used to seed new rows
    pub default_text: &'static str,
}

impl FieldDefinition {
    pub const fn new(key: &'static str, default_text: &'static str) -> Self {
        Self { key, default_text }
    }
}

/// Malformed field declarations. Fatal: the process must not start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("duplicate field key '{0}'")]
    DuplicateKey(&'static str),

    #[error("malformed field key '{key}': {reason}")]
    MalformedKey {
        key: &'static str,
        reason: &'static str,
    },
}

/// Registry of translatable fields, keyed by field key.
#[derive(Debug)]
pub struct FieldCatalog {
    fields: BTreeMap<&'static str, FieldDefinition>,
}

/// Global catalog instance (set by `initialize`)
static CATALOG: OnceLock<Arc<FieldCatalog>> = OnceLock::new();

impl FieldCatalog {
    /// Initialize the process-wide catalog from the static field declarations.
    ///
    /// Calling this again after a successful initialization returns the
    /// existing catalog without rebuilding it.
    pub fn initialize() -> Result<Arc<FieldCatalog>, CatalogError> {
        if let Some(catalog) = CATALOG.get() {
            return Ok(Arc::clone(catalog));
        }

        let catalog = Arc::new(Self::from_declarations(fields::DECLARATIONS)?);
        let catalog = CATALOG.get_or_init(|| catalog);
        info!("Field catalog initialized with {} fields", catalog.len());
        Ok(Arc::clone(catalog))
    }

    /// Get the process-wide catalog, if `initialize` has succeeded.
    pub fn global() -> Option<Arc<FieldCatalog>> {
        CATALOG.get().cloned()
    }

    /// Build a standalone catalog from a list of declarations.
    ///
    /// # Errors
    /// Returns `CatalogError` on the first duplicate or malformed key.
    pub fn from_declarations(declarations: &[FieldDefinition]) -> Result<Self, CatalogError> {
        let mut fields = BTreeMap::new();

        for field in declarations {
            validate_key(field.key)?;
            if fields.insert(field.key, *field).is_some() {
                return Err(CatalogError::DuplicateKey(field.key));
            }
        }

        Ok(Self { fields })
    }

    /// All declared keys, in sorted order.
    pub fn all_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// Look up a field by key.
    pub fn lookup(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields.get(key)
    }

    /// Fields whose key is not in `existing`.
    pub fn missing_from<'a>(
        &'a self,
        existing: &'a HashSet<String>,
    ) -> impl Iterator<Item = &'a FieldDefinition> + 'a {
        self.fields
            .values()
            .filter(move |field| !existing.contains(field.key))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn validate_key(key: &'static str) -> Result<(), CatalogError> {
    let malformed = |reason| CatalogError::MalformedKey { key, reason };

    if key.is_empty() {
        return Err(malformed("key is empty"));
    }
    if key.chars().any(char::is_whitespace) {
        return Err(malformed("key contains whitespace"));
    }
    if key.split('.').any(str::is_empty) {
        return Err(malformed("key has an empty segment"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(declarations: &[FieldDefinition]) -> FieldCatalog {
        FieldCatalog::from_declarations(declarations).expect("Should build catalog")
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_from_declarations_builds_catalog() {
        let catalog = catalog(&[
            FieldDefinition::new("welcome.title", "Welcome"),
            FieldDefinition::new("entry.key", "Key"),
        ]);

        assert_eq!(catalog.len(), 2);
        assert!(!catalog.is_empty());
    }

    #[test]
    fn test_from_declarations_empty() {
        let catalog = catalog(&[]);
        assert!(catalog.is_empty());
        assert_eq!(catalog.all_keys().count(), 0);
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let result = FieldCatalog::from_declarations(&[
            FieldDefinition::new("entry.key", "Key"),
            FieldDefinition::new("entry.value", "Value"),
            FieldDefinition::new("entry.key", "Another key"),
        ]);

        assert_eq!(result.unwrap_err(), CatalogError::DuplicateKey("entry.key"));
    }

    #[test]
    fn test_malformed_keys_are_rejected() {
        for key in ["", "entry key", "entry..key", ".entry", "entry.", "tab\tkey"] {
            let result = FieldCatalog::from_declarations(&[FieldDefinition::new(key, "x")]);
            assert!(
                matches!(result, Err(CatalogError::MalformedKey { key: k, .. }) if k == key),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::DuplicateKey("entry.key");
        assert_eq!(err.to_string(), "duplicate field key 'entry.key'");
    }

    // ==================== Query Tests ====================

    #[test]
    fn test_all_keys_sorted_and_stable() {
        let catalog = catalog(&[
            FieldDefinition::new("z.last", "Last"),
            FieldDefinition::new("a.first", "First"),
            FieldDefinition::new("m.middle", "Middle"),
        ]);

        let first: Vec<_> = catalog.all_keys().collect();
        let second: Vec<_> = catalog.all_keys().collect();
        assert_eq!(first, vec!["a.first", "m.middle", "z.last"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_lookup() {
        let catalog = catalog(&[FieldDefinition::new("welcome.title", "Welcome")]);

        let field = catalog.lookup("welcome.title").expect("Should find field");
        assert_eq!(field.default_text, "Welcome");
        assert!(catalog.lookup("welcome.subtitle").is_none());
    }

    #[test]
    fn test_missing_from() {
        let catalog = catalog(&[
            FieldDefinition::new("a", "A"),
            FieldDefinition::new("b", "B"),
            FieldDefinition::new("c", "C"),
        ]);
        let existing: HashSet<String> = ["b".to_string(), "unknown".to_string()].into();

        let missing: Vec<_> = catalog.missing_from(&existing).map(|f| f.key).collect();
        assert_eq!(missing, vec!["a", "c"]);
    }

    #[test]
    fn test_missing_from_all_present() {
        let catalog = catalog(&[FieldDefinition::new("a", "A")]);
        let existing: HashSet<String> = ["a".to_string()].into();

        assert_eq!(catalog.missing_from(&existing).count(), 0);
    }

    // ==================== Global Instance Tests ====================

    #[test]
    fn test_initialize_is_idempotent() {
        let first = FieldCatalog::initialize().expect("Declarations should be valid");
        let second = FieldCatalog::initialize().expect("Second call should succeed");

        // Should return the same instance
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &FieldCatalog::global().unwrap()));
    }

    #[test]
    fn test_initialize_loads_declarations() {
        let catalog = FieldCatalog::initialize().expect("Declarations should be valid");
        assert_eq!(catalog.len(), fields::DECLARATIONS.len());
    }
}
