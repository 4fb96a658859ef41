// Settings document engine for PalWorldSettings.ini: parse, validate, and
// write back edits without disturbing bytes the operator did not change.

mod document;
mod schema;
mod writer;

pub use document::{parse, SettingsDocument, DEFAULT_SECTION};
pub use schema::{FieldSchema, FieldSpec, ValueKind};
pub use writer::apply;

use std::collections::HashMap;

use thiserror::Error;

/// Raw field values of one settings section, untyped until the schema is
/// consulted.
pub type SectionValues = HashMap<String, String>;

/// Field-name → new-value edits a caller wants written back to the file.
pub type ChangeSet = HashMap<String, String>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("no settings section or assignment found in the input")]
    NoAssignableContent,

    #[error("no OptionSettings=(...) block found in the input")]
    MissingOptionBlock,
}
