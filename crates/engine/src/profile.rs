use std::collections::BTreeMap;

use formfill_semantics::{Category, FieldAnalyzer, FieldCategories, SemanticGroups};
use serde::Serialize;

use crate::discovery::{DiscoveredField, Discovery, DiscoverySource, ReaderFailure};
use crate::mapping::{FieldMapping, MappingProgress};

#[derive(Debug, Clone, Serialize)]
pub struct TemplateProgress {
    pub overall: MappingProgress,
    pub categories: BTreeMap<Category, MappingProgress>,
    pub semantic_groups: BTreeMap<String, MappingProgress>,
}

/// Everything an operator needs to map a template: its fields, their
/// categories and groups, the stored mapping and how complete it is.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateProfile {
    pub fields: Vec<DiscoveredField>,
    pub categories: FieldCategories,
    /// Semantic type → field ids, confidence ignored
    pub similar_fields: BTreeMap<String, Vec<String>>,
    /// Groups eligible for propagation
    pub semantic_groups: SemanticGroups,
    pub current_mappings: FieldMapping,
    pub progress: TemplateProgress,
    pub source: DiscoverySource,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reader_failures: Vec<ReaderFailure>,
}

impl TemplateProfile {
    #[must_use]
    pub fn build(analyzer: &FieldAnalyzer, discovery: Discovery, mapping: FieldMapping) -> Self {
        let categories = analyzer.categorize(discovery.field_names());
        let similar_fields = analyzer.coarse_groups(discovery.fingerprints());
        let semantic_groups = analyzer.confident_groups(discovery.fingerprints());

        let progress = TemplateProgress {
            overall: mapping.progress(discovery.field_names()),
            categories: categories
                .iter()
                .map(|(category, fields)| {
                    (category, mapping.progress(fields.iter().map(String::as_str)))
                })
                .collect(),
            semantic_groups: semantic_groups
                .iter()
                .map(|(semantic_type, members)| {
                    let fields = members.iter().map(|m| m.field.as_str());
                    (semantic_type.to_string(), mapping.progress(fields))
                })
                .collect(),
        };

        Self {
            fields: discovery.fields,
            categories,
            similar_fields,
            semantic_groups,
            current_mappings: mapping,
            progress,
            source: discovery.source,
            reader_failures: discovery.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::FieldDiscovery;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn placeholder_profile_groups_aliases() {
        let analyzer = FieldAnalyzer::builtin();
        let discovery =
            FieldDiscovery::new(analyzer.clone()).discover(Path::new("missing.pdf"));
        let mapping: FieldMapping = [("customer_id", "id_number")].into_iter().collect();
        let profile = TemplateProfile::build(&analyzer, discovery, mapping);

        assert_eq!(profile.source, DiscoverySource::Placeholder);
        let ids: Vec<&str> = profile
            .semantic_groups
            .get("id_number")
            .unwrap()
            .iter()
            .map(|m| m.field.as_str())
            .collect();
        assert_eq!(ids, vec!["id_number", "customer_id", "id_verification"]);
        assert_eq!(
            profile.similar_fields["email"],
            vec!["email".to_string(), "contact_email".to_string()]
        );

        let id_progress = profile.progress.semantic_groups["id_number"];
        assert_eq!((id_progress.total, id_progress.mapped), (3, 1));
        assert_eq!(profile.progress.overall.mapped, 1);
        assert_eq!(profile.progress.overall.total, 22);
        assert!(profile.categories.iter().all(|(_, fields)| !fields.is_empty()));
    }
}
