//! Locale type: validated language/region identifier.
//!
//! Locales arrive from configuration and from the `supported_locale` table, so
//! they are validated once on the way in and carried around as `Locale`
//! afterwards.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Error returned when a string is not a usable locale identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid locale identifier: '{0}'")]
pub struct LocaleError(pub String);

/// A validated locale identifier.
///
/// Accepts a 2-3 letter lowercase language code, optionally followed by `_` or
/// `-` and a 2 letter uppercase region (e.g. "en", "fi_FI", "pt-BR").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locale(String);

fn locale_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z]{2,3}(?:[_-][A-Z]{2})?$").expect("Locale pattern should compile")
    })
}

impl Locale {
    /// Create a Locale from an identifier string.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Example
    /// ```ignore
    /// let finnish = Locale::from_code("fi_FI")?;
    /// ```
    pub fn from_code(code: &str) -> Result<Locale, LocaleError> {
        let code = code.trim();
        if locale_pattern().is_match(code) {
            Ok(Locale(code.to_string()))
        } else {
            Err(LocaleError(code.to_string()))
        }
    }

    /// Get the identifier as stored in the translation table.
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Locale {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::from_code(s)
    }
}

/// Parse a comma-separated locale list, dropping empty entries and duplicates
/// while keeping first-seen order.
pub fn parse_locale_list(list: &str) -> Result<Vec<Locale>, LocaleError> {
    let mut locales: Vec<Locale> = Vec::new();
    for part in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let locale = Locale::from_code(part)?;
        if !locales.contains(&locale) {
            locales.push(locale);
        }
    }
    Ok(locales)
}
