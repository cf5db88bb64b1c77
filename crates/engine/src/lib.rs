//! # Formfill Engine
//!
//! Discovers a template's fields, builds its semantic profile and turns an
//! explicit field mapping plus a record into filled output.
//!
//! ## Flow
//!
//! ```text
//! template ──> FieldDiscovery (readers in order, placeholder set last)
//!                  │
//!                  ▼
//!          fingerprints + categories + groups ──> TemplateProfile
//!                  │
//!   mapping ──┐    ▼
//!   record  ──┴─> FillPlanner (explicit, then propagation) ──> FillPlan
//!                  │
//!                  ▼
//!              DocumentWriter ──(failure)──> template copy, Degraded
//! ```
//!
//! ## Example
//!
//! ```rust
//! use formfill_engine::{FieldDiscovery, FieldMapping, FillPlanner, RecordMap, RecordValue};
//! use formfill_semantics::FieldAnalyzer;
//! use std::path::Path;
//!
//! // no readers: the placeholder field set stands in
//! let discovery = FieldDiscovery::new(FieldAnalyzer::builtin()).discover(Path::new("form.pdf"));
//! let groups = FieldAnalyzer::builtin().confident_groups(discovery.fingerprints());
//!
//! let mapping: FieldMapping = [("customer_id", "id_number")].into_iter().collect();
//! let record = RecordMap::from([("id_number".to_string(), RecordValue::from("A123"))]);
//!
//! let plan = FillPlanner::default().plan(&discovery.fields, &groups, &mapping, &record);
//! assert_eq!(plan.values["id_verification"], "A123");
//! ```

mod discovery;
mod error;
mod fill;
mod mapping;
mod planner;
mod profile;
mod record;
mod workspace;

pub use discovery::{
    DiscoveredField, Discovery, DiscoverySource, FieldDiscovery, ReaderFailure,
    PLACEHOLDER_FIELDS, VERIFICATION_ALIASES, VERIFICATION_ALIAS_CONFIDENCE,
};
pub use error::{EngineError, Result};
pub use fill::{FillOutcome, FillService, FillStatus};
pub use mapping::{FieldMapping, MappingProgress, TemplateStore};
pub use planner::{
    ExplicitAssignment, FillPlan, FillPlanner, MissingTarget, PropagatedAssignment,
    DEFAULT_MIN_PROPAGATION_CONFIDENCE,
};
pub use profile::{TemplateProfile, TemplateProgress};
pub use record::{record_from_json, Record, RecordMap, RecordStore, RecordValue, DATE_FORMAT};
pub use workspace::{
    StoredTemplate, TemplateWorkspace, MAPPINGS_DIR_NAME, OUTPUTS_DIR_NAME, RECORDS_DIR_NAME,
    TEMPLATES_DIR_NAME,
};
