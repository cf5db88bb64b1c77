//! # Formfill Semantics
//!
//! Pure, deterministic reasoning over form-field names.
//!
//! ## Pipeline
//!
//! ```text
//! raw field id (+ declared type/format)
//!     │
//!     ├──> Normalizer      → display name
//!     │
//!     ├──> Fingerprinter   → semantic_type:confidence (or unclassified:<digest>)
//!     │
//!     ├──> Categorizer     → personal_info | contact_info | ... | other
//!     │
//!     └──> Grouper         → fields sharing a semantic type
//! ```
//!
//! Fingerprinting and categorization answer different questions (cross-field
//! identity vs. a browsing bucket) and are deliberately kept independent.
//!
//! ## Example
//!
//! ```rust
//! use formfill_semantics::FieldAnalyzer;
//!
//! let analyzer = FieldAnalyzer::builtin();
//! let fp = analyzer.fingerprint("contact_email", None);
//! assert_eq!(fp.semantic_type(), "email");
//! assert_eq!(analyzer.display_name("contact_email"), "Contact Email");
//! ```

mod categorize;
mod error;
mod fingerprint;
mod grouping;
mod normalize;
mod rules;

pub use categorize::{Category, FieldCategories, FieldCategorizer};
pub use error::{Result, SemanticsError};
pub use fingerprint::{FieldHints, Fingerprint, Fingerprinter, UNCLASSIFIED};
pub use grouping::{GroupMember, SemanticGrouper, SemanticGroups, DEFAULT_MIN_GROUP_CONFIDENCE};
pub use normalize::{Normalizer, DEFAULT_STRUCTURAL_PREFIX};
pub use rules::{
    CategoryRules, FingerprintRules, Keyword, RuleSet, SemanticTypeRule, RULES_SCHEMA_VERSION,
};

use std::collections::BTreeMap;

/// All field-name analyzers built from one rule set.
#[derive(Debug, Clone)]
pub struct FieldAnalyzer {
    normalizer: Normalizer,
    fingerprinter: Fingerprinter,
    categorizer: FieldCategorizer,
    grouper: SemanticGrouper,
}

impl FieldAnalyzer {
    #[must_use]
    pub fn new(rules: &RuleSet) -> Self {
        Self {
            normalizer: rules.normalizer().clone(),
            fingerprinter: Fingerprinter::new(
                rules.normalizer().clone(),
                rules.fingerprint().clone(),
            ),
            categorizer: FieldCategorizer::new(
                rules.normalizer().clone(),
                rules.categories().clone(),
            ),
            grouper: SemanticGrouper::default(),
        }
    }

    #[must_use]
    pub fn builtin() -> Self {
        Self::new(&RuleSet::builtin())
    }

    #[must_use]
    pub fn with_grouper(mut self, grouper: SemanticGrouper) -> Self {
        self.grouper = grouper;
        self
    }

    #[must_use]
    pub fn display_name(&self, raw: &str) -> String {
        self.normalizer.display_name(raw)
    }

    #[must_use]
    pub fn fingerprint(&self, raw: &str, hints: Option<&FieldHints>) -> Fingerprint {
        self.fingerprinter.fingerprint(raw, hints)
    }

    #[must_use]
    pub fn category_of(&self, raw: &str) -> Category {
        self.categorizer.category_of(raw)
    }

    pub fn categorize<'a, I>(&self, fields: I) -> FieldCategories
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.categorizer.categorize(fields)
    }

    pub fn coarse_groups<'a, I>(&self, fields: I) -> BTreeMap<String, Vec<String>>
    where
        I: IntoIterator<Item = (&'a str, &'a Fingerprint)>,
    {
        self.grouper.coarse(fields)
    }

    pub fn confident_groups<'a, I>(&self, fields: I) -> SemanticGroups
    where
        I: IntoIterator<Item = (&'a str, &'a Fingerprint)>,
    {
        self.grouper.by_confidence(fields)
    }

    #[must_use]
    pub const fn grouper(&self) -> &SemanticGrouper {
        &self.grouper
    }

    #[must_use]
    pub const fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }
}

impl Default for FieldAnalyzer {
    fn default() -> Self {
        Self::builtin()
    }
}
