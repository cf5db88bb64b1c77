use std::fmt;
use std::path::{Path, PathBuf};

use formfill_document::{AcroFormWriter, DocumentWriter};
use serde::Serialize;

use crate::discovery::{Discovery, FieldDiscovery};
use crate::mapping::FieldMapping;
use crate::planner::{FillPlan, FillPlanner};
use crate::record::Record;
use crate::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FillStatus {
    Filled,
    /// The writer failed; the output is an unmodified copy of the template
    Degraded { reason: String },
}

impl FillStatus {
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

impl fmt::Display for FillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filled => f.write_str("filled"),
            Self::Degraded { reason } => write!(f, "degraded ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FillOutcome {
    pub output: PathBuf,
    pub status: FillStatus,
    pub plan: FillPlan,
    pub discovery: Discovery,
}

/// Discovery, planning and writing for one template/record pair.
pub struct FillService {
    discovery: FieldDiscovery,
    planner: FillPlanner,
    writer: Box<dyn DocumentWriter>,
}

impl FillService {
    #[must_use]
    pub fn new(discovery: FieldDiscovery, writer: impl DocumentWriter + 'static) -> Self {
        Self {
            discovery,
            planner: FillPlanner::default(),
            writer: Box::new(writer),
        }
    }

    /// Default readers and the AcroForm writer.
    #[must_use]
    pub fn acroform(analyzer: formfill_semantics::FieldAnalyzer) -> Self {
        Self::new(FieldDiscovery::with_default_readers(analyzer), AcroFormWriter)
    }

    #[must_use]
    pub fn with_planner(mut self, planner: FillPlanner) -> Self {
        self.planner = planner;
        self
    }

    #[must_use]
    pub const fn discovery(&self) -> &FieldDiscovery {
        &self.discovery
    }

    pub fn plan<R: Record + ?Sized>(
        &self,
        template: &Path,
        mapping: &FieldMapping,
        record: &R,
    ) -> (Discovery, FillPlan) {
        let discovery = self.discovery.discover(template);
        let groups = self
            .discovery
            .analyzer()
            .confident_groups(discovery.fingerprints());
        let plan = self.planner.plan(&discovery.fields, &groups, mapping, record);
        (discovery, plan)
    }

    /// Writes the planned values to `output`. The outcome carries the path
    /// the writer reports, which may differ from the one requested. A writer
    /// failure degrades to a plain copy of the template at `output`; only a
    /// failing copy is an error.
    pub fn fill<R: Record + ?Sized>(
        &self,
        template: &Path,
        mapping: &FieldMapping,
        record: &R,
        output: &Path,
    ) -> Result<FillOutcome> {
        let (discovery, plan) = self.plan(template, mapping, record);

        let (output, status) = match self.writer.write(template, &plan.values, output) {
            Ok(written) => {
                log::info!(
                    "wrote {} value(s) to {} via {}",
                    plan.values.len(),
                    written.display(),
                    self.writer.name()
                );
                (written, FillStatus::Filled)
            }
            Err(err) => {
                log::warn!(
                    "writer {} failed on {}: {err}; copying template unchanged",
                    self.writer.name(),
                    template.display()
                );
                copy_template(template, output)?;
                let status = FillStatus::Degraded {
                    reason: err.to_string(),
                };
                (output.to_path_buf(), status)
            }
        };

        Ok(FillOutcome {
            output,
            status,
            plan,
            discovery,
        })
    }
}

impl fmt::Debug for FillService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillService")
            .field("discovery", &self.discovery)
            .field("planner", &self.planner)
            .field("writer", &self.writer.name())
            .finish()
    }
}

fn copy_template(template: &Path, output: &Path) -> Result<()> {
    let copy = || -> std::io::Result<()> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(template, output)?;
        Ok(())
    };
    copy().map_err(|source| EngineError::FallbackCopy {
        output: output.to_path_buf(),
        source,
    })
}
