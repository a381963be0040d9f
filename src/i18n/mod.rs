//! Translatable fields and locales.
//!
//! - `catalog`: process-wide registry of field keys and their default text
//! - `fields`: the static field declarations the catalog is built from
//! - `locale`: validated locale identifiers
//!
//! # Example
//!
//! ```rust,ignore
//! use hoot::i18n::{FieldCatalog, Locale};
//!
//! let catalog = FieldCatalog::initialize()?;
//! let finnish = Locale::from_code("fi_FI")?;
//! ```

mod catalog;
pub mod fields;
mod locale;

pub use catalog::{CatalogError, FieldCatalog, FieldDefinition};
pub use locale::{parse_locale_list, Locale, LocaleError};
