use std::collections::BTreeMap;

use formfill_semantics::{Category, FieldCategories, SemanticGroups};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Owner of per-template mappings.
pub trait TemplateStore {
    /// Stored mapping for `template`; empty when none was saved yet.
    fn field_mapping(&self, template: &str) -> Result<FieldMapping>;
}

/// Operator-declared `field id → record attribute` assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(BTreeMap<String, String>);

impl FieldMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the attribute previously mapped to `field`, if any.
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Option<String> {
        self.0.insert(field.into(), attribute.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_mapped(&self, field: &str) -> bool {
        self.0.get(field).is_some_and(|attribute| !attribute.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, a)| (f.as_str(), a.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Map every field of `category` to `attribute`, overwriting earlier
    /// choices. Returns the number of fields touched.
    pub fn assign_category(
        &mut self,
        categories: &FieldCategories,
        category: Category,
        attribute: &str,
    ) -> usize {
        let fields = categories.get(category).unwrap_or_default();
        for field in fields {
            self.insert(field.as_str(), attribute);
        }
        fields.len()
    }

    /// Map every member of a confidence-aware semantic group to `attribute`.
    pub fn assign_group(
        &mut self,
        groups: &SemanticGroups,
        semantic_type: &str,
        attribute: &str,
    ) -> usize {
        let members = groups.get(semantic_type).unwrap_or_default();
        for member in members {
            self.insert(member.field.as_str(), attribute);
        }
        members.len()
    }

    /// Completion of a set of fields against this mapping.
    pub fn progress<'a, I>(&self, fields: I) -> MappingProgress
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut progress = MappingProgress::default();
        for field in fields {
            progress.total += 1;
            if self.is_mapped(field) {
                progress.mapped += 1;
            }
        }
        progress.percentage = if progress.total == 0 {
            0
        } else {
            let ratio = progress.mapped as f64 / progress.total as f64;
            (ratio * 100.0).round() as u8
        };
        progress
    }
}

impl FromIterator<(String, String)> for FieldMapping {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for FieldMapping {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(f, a)| (f.to_string(), a.to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingProgress {
    pub total: usize,
    pub mapped: usize,
    /// Rounded to the nearest whole percent; 0 for an empty set
    pub percentage: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use formfill_semantics::{FieldAnalyzer, Fingerprint};
    use pretty_assertions::assert_eq;

    #[test]
    fn category_bulk_mapping_overwrites() {
        let analyzer = FieldAnalyzer::builtin();
        let categories = analyzer.categorize(["email", "phone", "iban"]);
        let mut mapping: FieldMapping = [("email", "old")].into_iter().collect();

        let touched = mapping.assign_category(&categories, Category::ContactInfo, "contact");
        assert_eq!(touched, 2);
        assert_eq!(mapping.get("email"), Some("contact"));
        assert_eq!(mapping.get("phone"), Some("contact"));
        assert_eq!(mapping.get("iban"), None);
        assert_eq!(mapping.assign_category(&categories, Category::TaxInfo, "x"), 0);
    }

    #[test]
    fn group_bulk_mapping_covers_members() {
        let analyzer = FieldAnalyzer::builtin();
        let fingerprints = [
            ("customer_id", Fingerprint::classified("id_number", 0.67)),
            ("id_verification", Fingerprint::classified("id_number", 0.67)),
        ];
        let groups = analyzer.confident_groups(fingerprints.iter().map(|(f, fp)| (*f, fp)));
        let mut mapping = FieldMapping::new();
        assert_eq!(mapping.assign_group(&groups, "id_number", "id_number"), 2);
        assert!(mapping.is_mapped("customer_id"));
        assert!(mapping.is_mapped("id_verification"));
    }

    #[test]
    fn progress_rounds_percentage() {
        let mapping: FieldMapping = [("a", "x"), ("b", ""), ("zz", "y")].into_iter().collect();
        let progress = mapping.progress(["a", "b", "c"]);
        assert_eq!(
            progress,
            MappingProgress {
                total: 3,
                mapped: 1,
                percentage: 33
            }
        );
        assert_eq!(mapping.progress([]).percentage, 0);
    }
}
