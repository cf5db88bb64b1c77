use std::collections::BTreeMap;

use serde::Serialize;

use crate::fingerprint::Fingerprint;

/// Default floor a group needs at least one member above before it counts.
pub const DEFAULT_MIN_GROUP_CONFIDENCE: f32 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMember {
    pub field: String,
    pub confidence: f32,
}

/// Semantic type → member fields with their confidence, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SemanticGroups(BTreeMap<String, Vec<GroupMember>>);

impl SemanticGroups {
    #[must_use]
    pub fn get(&self, semantic_type: &str) -> Option<&[GroupMember]> {
        self.0.get(semantic_type).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[GroupMember])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Clusters fingerprinted fields that share a semantic type.
#[derive(Debug, Clone, Copy)]
pub struct SemanticGrouper {
    min_group_confidence: f32,
}

impl SemanticGrouper {
    #[must_use]
    pub const fn new(min_group_confidence: f32) -> Self {
        Self {
            min_group_confidence,
        }
    }

    #[must_use]
    pub const fn min_group_confidence(&self) -> f32 {
        self.min_group_confidence
    }

    /// Display grouping: type → field ids, confidence ignored, singletons dropped.
    pub fn coarse<'a, I>(&self, fields: I) -> BTreeMap<String, Vec<String>>
    where
        I: IntoIterator<Item = (&'a str, &'a Fingerprint)>,
    {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, fingerprint) in fields {
            groups
                .entry(fingerprint.group_key().into_owned())
                .or_default()
                .push(field.to_string());
        }
        groups.retain(|_, members| members.len() > 1);
        groups
    }

    /// Propagation grouping: keeps confidences and drops groups with a single
    /// member or with no member above the configured floor.
    pub fn by_confidence<'a, I>(&self, fields: I) -> SemanticGroups
    where
        I: IntoIterator<Item = (&'a str, &'a Fingerprint)>,
    {
        let mut groups: BTreeMap<String, Vec<GroupMember>> = BTreeMap::new();
        for (field, fingerprint) in fields {
            groups
                .entry(fingerprint.group_key().into_owned())
                .or_default()
                .push(GroupMember {
                    field: field.to_string(),
                    confidence: fingerprint.confidence(),
                });
        }
        let floor = self.min_group_confidence;
        groups.retain(|semantic_type, members| {
            let keep = members.len() > 1 && members.iter().any(|m| m.confidence > floor);
            if !keep && members.len() > 1 {
                log::debug!("dropping weak group '{semantic_type}' ({} members)", members.len());
            }
            keep
        });
        SemanticGroups(groups)
    }
}

impl Default for SemanticGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_GROUP_CONFIDENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fields() -> Vec<(&'static str, Fingerprint)> {
        vec![
            ("customer_id", Fingerprint::classified("id_number", 0.6)),
            ("id_verification", Fingerprint::classified("id_number", 0.55)),
            ("unrelated", Fingerprint::classified("email", 0.9)),
        ]
    }

    #[test]
    fn confidence_grouping_keeps_only_multi_member_groups() {
        let fields = fields();
        let groups = SemanticGrouper::default().by_confidence(fields.iter().map(|(f, fp)| (*f, fp)));

        assert_eq!(groups.len(), 1);
        let members = groups.get("id_number").unwrap();
        assert_eq!(
            members.iter().map(|m| m.field.as_str()).collect::<Vec<_>>(),
            vec!["customer_id", "id_verification"]
        );
        assert!(groups.get("email").is_none());
    }

    #[test]
    fn weak_groups_are_dropped() {
        let weak = vec![
            ("a", Fingerprint::classified("date", 0.4)),
            ("b", Fingerprint::classified("date", 0.25)),
        ];
        let grouper = SemanticGrouper::default();
        assert!(grouper
            .by_confidence(weak.iter().map(|(f, fp)| (*f, fp)))
            .is_empty());
        // coarse grouping ignores confidence
        assert_eq!(
            grouper.coarse(weak.iter().map(|(f, fp)| (*f, fp))).get("date"),
            Some(&vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn unclassified_fields_group_by_digest_only() {
        let fields = vec![
            ("xyz[0]", Fingerprint::unclassified("aaaa0000")),
            ("xyz[1]", Fingerprint::unclassified("aaaa0000")),
            ("qqq", Fingerprint::unclassified("bbbb1111")),
        ];
        let grouper = SemanticGrouper::default();
        let coarse = grouper.coarse(fields.iter().map(|(f, fp)| (*f, fp)));
        assert_eq!(coarse.len(), 1);
        assert!(coarse.contains_key("unclassified:aaaa0000"));
        assert!(grouper
            .by_confidence(fields.iter().map(|(f, fp)| (*f, fp)))
            .is_empty());
    }

    #[test]
    fn serializes_members_with_confidence() {
        let fields = fields();
        let groups = SemanticGrouper::default().by_confidence(fields.iter().map(|(f, fp)| (*f, fp)));
        let json = serde_json::to_value(&groups).unwrap();
        assert_eq!(json["id_number"][0]["field"], "customer_id");
        assert!((json["id_number"][1]["confidence"].as_f64().unwrap() - 0.55).abs() < 1e-6);
    }
}
