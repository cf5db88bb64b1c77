use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// A fillable field as reported by a reader, before any semantic analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawField {
    /// Fully qualified field identifier
    pub name: String,
    /// Declared field type (e.g. `Tx`, `Btn`, `Ch`, `Sig`)
    pub declared_type: Option<String>,
    /// Kind of the default value, when one is present
    pub declared_format: Option<String>,
}

impl RawField {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            declared_format: None,
        }
    }
}

/// Capability that lists a template's fillable fields.
///
/// Readers are tried one after another, so an implementation must leave no
/// state behind when it fails.
pub trait DocumentReader {
    /// Short identifier used in logs and discovery reports
    fn name(&self) -> &str;

    fn read_fields(&self, template: &Path) -> Result<Vec<RawField>>;
}

/// Capability that writes field values into a copy of a template.
///
/// Unknown field ids are ignored; fields missing from `values` keep their
/// template defaults.
pub trait DocumentWriter {
    fn name(&self) -> &str;

    fn write(
        &self,
        template: &Path,
        values: &BTreeMap<String, String>,
        output: &Path,
    ) -> Result<PathBuf>;
}
