//! Translation synchronizer for the Hoot site.
//!
//! Keeps the translatable fields declared in code in step with the
//! `translation` table for every supported locale.

pub mod config;
pub mod i18n;
pub mod lifecycle;
pub mod retry;
pub mod server;
pub mod store;
pub mod sync;
