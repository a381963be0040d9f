//! Static declarations of every translatable field shown by the site.
//!
//! Adding a field here is all it takes: the synchronizer seeds a row for it in
//! every supported locale on its next pass.

use super::catalog::FieldDefinition;

pub const DECLARATIONS: &[FieldDefinition] = &[
    // Dashboard
    FieldDefinition::new("dashboard.title", "Dashboard"),
    FieldDefinition::new("dashboard.description", "Translation entries"),
    // Entry flow
    FieldDefinition::new("entry.header", "Entries"),
    FieldDefinition::new("entry.path", "Path"),
    FieldDefinition::new("entry.basename", "Basename"),
    FieldDefinition::new("entry.language", "Language"),
    FieldDefinition::new("entry.country", "Country"),
    FieldDefinition::new("entry.key", "Key"),
    FieldDefinition::new("entry.value", "Value"),
    FieldDefinition::new("entry.author", "Author"),
    FieldDefinition::new("entry.created", "Created"),
    FieldDefinition::new("entry.modified", "Modified"),
    FieldDefinition::new("entry.missing", "Missing"),
    // Entry editor
    FieldDefinition::new("entry.edit.header", "Edit Entry"),
    FieldDefinition::new("entry.edit.save", "Save"),
    FieldDefinition::new("entry.edit.discard", "Discard"),
    FieldDefinition::new("entry.edit.delete", "Delete"),
    // Navigation
    FieldDefinition::new("page.dashboard", "Dashboard"),
    FieldDefinition::new("page.account", "Account"),
    FieldDefinition::new("page.users", "Users"),
    FieldDefinition::new("page.groups", "Groups"),
    FieldDefinition::new("page.customers", "Customers"),
    FieldDefinition::new("page.companies", "Companies"),
    FieldDefinition::new("page.login", "Login"),
];
