//! Field discovery with an ordered reader strategy list and a placeholder
//! field set for templates nothing could be read from.

use std::fmt;
use std::path::Path;

use formfill_document::{AcroFormReader, DocumentReader, FieldListReader, RawField};
use formfill_semantics::{Category, FieldAnalyzer, FieldHints, Fingerprint};
use serde::Serialize;

/// Generic field names offered when a template yields no fields.
pub const PLACEHOLDER_FIELDS: [&str; 16] = [
    "name",
    "first_name",
    "last_name",
    "email",
    "phone",
    "address",
    "city",
    "state",
    "zip",
    "date",
    "signature",
    "id_number",
    "tax_number",
    "bank_name",
    "account_number",
    "branch_code",
];

/// Duplicate-concept fields added to the placeholder set with a fixed
/// semantic type, so propagation can be exercised on any template.
pub const VERIFICATION_ALIASES: [(&str, &str); 6] = [
    ("customer_id", "id_number"),
    ("full_name", "name"),
    ("contact_email", "email"),
    ("contact_phone", "phone"),
    ("id_verification", "id_number"),
    ("bank_account", "account_number"),
];

pub const VERIFICATION_ALIAS_CONFIDENCE: f32 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredField {
    pub name: String,
    pub display_name: String,
    /// Always empty at discovery time
    pub value: String,
    pub semantic_fingerprint: Fingerprint,
    pub category: Category,
}

/// Where a discovery's fields came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reader", rename_all = "snake_case")]
pub enum DiscoverySource {
    Reader(String),
    Placeholder,
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader(name) => write!(f, "reader:{name}"),
            Self::Placeholder => f.write_str("placeholder"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderFailure {
    pub reader: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    pub fields: Vec<DiscoveredField>,
    pub source: DiscoverySource,
    /// Readers that errored before one succeeded (or before falling back)
    pub failures: Vec<ReaderFailure>,
}

impl Discovery {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&DiscoveredField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = (&str, &Fingerprint)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), &f.semantic_fingerprint))
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.source == DiscoverySource::Placeholder
    }
}

/// Runs readers in order and fingerprints whatever the first productive one
/// returns.
pub struct FieldDiscovery {
    readers: Vec<Box<dyn DocumentReader>>,
    analyzer: FieldAnalyzer,
}

impl FieldDiscovery {
    #[must_use]
    pub fn new(analyzer: FieldAnalyzer) -> Self {
        Self {
            readers: Vec::new(),
            analyzer,
        }
    }

    /// AcroForm tree walk first, top-level field list second.
    #[must_use]
    pub fn with_default_readers(analyzer: FieldAnalyzer) -> Self {
        Self::new(analyzer)
            .with_reader(AcroFormReader)
            .with_reader(FieldListReader)
    }

    #[must_use]
    pub fn with_reader(mut self, reader: impl DocumentReader + 'static) -> Self {
        self.readers.push(Box::new(reader));
        self
    }

    #[must_use]
    pub const fn analyzer(&self) -> &FieldAnalyzer {
        &self.analyzer
    }

    pub fn reader_names(&self) -> impl Iterator<Item = &str> {
        self.readers.iter().map(|r| r.name())
    }

    /// Never fails: reader errors are recorded in the result and the
    /// placeholder set stands in when no reader produces fields.
    pub fn discover(&self, template: &Path) -> Discovery {
        let mut failures = Vec::new();
        for reader in &self.readers {
            match reader.read_fields(template) {
                Ok(raw) if !raw.is_empty() => {
                    log::info!(
                        "discovered {} field(s) in {} via {}",
                        raw.len(),
                        template.display(),
                        reader.name()
                    );
                    return Discovery {
                        fields: self.analyze(raw),
                        source: DiscoverySource::Reader(reader.name().to_string()),
                        failures,
                    };
                }
                Ok(_) => log::debug!("reader {} found no fields", reader.name()),
                Err(err) => {
                    log::warn!("reader {} failed on {}: {err}", reader.name(), template.display());
                    failures.push(ReaderFailure {
                        reader: reader.name().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        log::warn!(
            "no fields found in {}; using placeholder field set",
            template.display()
        );
        Discovery {
            fields: self.placeholders(),
            source: DiscoverySource::Placeholder,
            failures,
        }
    }

    fn analyze(&self, raw: Vec<RawField>) -> Vec<DiscoveredField> {
        let mut fields: Vec<DiscoveredField> = Vec::with_capacity(raw.len());
        for field in raw {
            if fields.iter().any(|f| f.name == field.name) {
                log::debug!("duplicate field id '{}' ignored", field.name);
                continue;
            }
            let hints = FieldHints::new(field.declared_type, field.declared_format);
            let fingerprint = self
                .analyzer
                .fingerprint(&field.name, (!hints.is_empty()).then_some(&hints));
            log::debug!("{} -> {fingerprint}", field.name);
            fields.push(self.describe(field.name, fingerprint));
        }
        fields
    }

    fn placeholders(&self) -> Vec<DiscoveredField> {
        let generic = PLACEHOLDER_FIELDS.iter().map(|name| {
            let fingerprint = self.analyzer.fingerprint(name, None);
            self.describe((*name).to_string(), fingerprint)
        });
        let aliases = VERIFICATION_ALIASES.iter().map(|(name, semantic_type)| {
            let fingerprint =
                Fingerprint::classified(*semantic_type, VERIFICATION_ALIAS_CONFIDENCE);
            self.describe((*name).to_string(), fingerprint)
        });
        generic.chain(aliases).collect()
    }

    fn describe(&self, name: String, semantic_fingerprint: Fingerprint) -> DiscoveredField {
        DiscoveredField {
            display_name: self.analyzer.display_name(&name),
            category: self.analyzer.category_of(&name),
            value: String::new(),
            semantic_fingerprint,
            name,
        }
    }
}

impl fmt::Debug for FieldDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDiscovery")
            .field("readers", &self.reader_names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
