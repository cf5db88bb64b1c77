use std::collections::BTreeMap;

use formfill_semantics::SemanticGroups;
use serde::Serialize;

use crate::discovery::DiscoveredField;
use crate::mapping::FieldMapping;
use crate::record::Record;

/// Group members below this confidence never receive propagated values.
pub const DEFAULT_MIN_PROPAGATION_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplicitAssignment {
    pub attribute: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagatedAssignment {
    /// Explicitly mapped field the value was copied from
    pub source_field: String,
    pub attribute: String,
    pub semantic_type: String,
    pub confidence: f32,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingTarget {
    pub field: String,
    pub attribute: String,
}

/// Values staged for the writer plus how each one was chosen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillPlan {
    /// Field id → value handed to the writer
    pub values: BTreeMap<String, String>,
    pub explicit: BTreeMap<String, ExplicitAssignment>,
    pub propagated: BTreeMap<String, PropagatedAssignment>,
    /// Mapping entries whose attribute is absent from the record
    pub missing_attributes: Vec<MissingTarget>,
}

/// Turns explicit mappings plus semantic groups into concrete field values.
#[derive(Debug, Clone, Copy)]
pub struct FillPlanner {
    min_propagation_confidence: f32,
}

impl FillPlanner {
    #[must_use]
    pub const fn new(min_propagation_confidence: f32) -> Self {
        Self {
            min_propagation_confidence,
        }
    }

    #[must_use]
    pub const fn min_propagation_confidence(&self) -> f32 {
        self.min_propagation_confidence
    }

    /// Explicit entries are staged first and never overwritten. Each one
    /// then spreads its value to the other members of its field's
    /// confidence-aware group, skipping members that carry their own mapping
    /// or sit below the propagation floor. When two explicit entries feed
    /// the same group, the later one (by field id) wins for shared members.
    pub fn plan<R: Record + ?Sized>(
        &self,
        fields: &[DiscoveredField],
        groups: &SemanticGroups,
        mapping: &FieldMapping,
        record: &R,
    ) -> FillPlan {
        let mut plan = FillPlan::default();

        for (field, attribute) in mapping.iter() {
            if attribute.is_empty() {
                continue;
            }
            let Some(value) = record.get(attribute) else {
                log::warn!("mapping {field} -> {attribute}: attribute missing from record");
                plan.missing_attributes.push(MissingTarget {
                    field: field.to_string(),
                    attribute: attribute.to_string(),
                });
                continue;
            };
            let value = value.render();
            log::debug!("explicit {field} <- {attribute} = {value}");
            plan.values.insert(field.to_string(), value.clone());
            plan.explicit.insert(
                field.to_string(),
                ExplicitAssignment {
                    attribute: attribute.to_string(),
                    value,
                },
            );
        }

        for (field, assignment) in &plan.explicit {
            let Some(discovered) = fields.iter().find(|f| &f.name == field) else {
                log::debug!("mapped field {field} not present in template; nothing to propagate");
                continue;
            };
            let key = discovered.semantic_fingerprint.group_key();
            let Some(members) = groups.get(&key) else {
                continue;
            };
            for member in members {
                if member.field == *field || mapping.is_mapped(&member.field) {
                    continue;
                }
                if member.confidence < self.min_propagation_confidence {
                    log::debug!(
                        "skip {} ({key}, confidence {:.2}): below propagation floor",
                        member.field,
                        member.confidence
                    );
                    continue;
                }
                log::debug!(
                    "propagate {} <- {field} ({key}, confidence {:.2})",
                    member.field,
                    member.confidence
                );
                plan.propagated.insert(
                    member.field.clone(),
                    PropagatedAssignment {
                        source_field: field.clone(),
                        attribute: assignment.attribute.clone(),
                        semantic_type: key.to_string(),
                        confidence: member.confidence,
                        value: assignment.value.clone(),
                    },
                );
            }
        }

        for (field, propagated) in &plan.propagated {
            plan.values.insert(field.clone(), propagated.value.clone());
        }

        log::info!(
            "fill plan: {} explicit, {} propagated, {} missing attribute(s)",
            plan.explicit.len(),
            plan.propagated.len(),
            plan.missing_attributes.len()
        );
        plan
    }
}

impl Default for FillPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PROPAGATION_CONFIDENCE)
    }
}
