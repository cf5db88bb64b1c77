use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};
use formfill_engine::{
    record_from_json, EngineError, FieldDiscovery, FieldMapping, FillPlanner, FillService,
    RecordStore, TemplateProfile, TemplateStore, TemplateWorkspace,
};
use formfill_semantics::{Category, FieldAnalyzer, FieldHints};
use serde::Serialize;
use serde_json::json;

use crate::response::CommandResponse;

/// Requested changes to a stored mapping. Applied as: clear, categories,
/// groups, single fields, removals.
pub struct MapEdits {
    pub clear: bool,
    pub set: Vec<(String, String)>,
    pub group: Vec<(String, String)>,
    pub category: Vec<(String, String)>,
    pub unset: Vec<String>,
}

pub struct Context {
    workspace: TemplateWorkspace,
    analyzer: FieldAnalyzer,
    planner: FillPlanner,
}

/// A template argument resolved to a file; `id` is set for stored templates.
struct ResolvedTemplate {
    id: Option<String>,
    path: PathBuf,
}

#[derive(Serialize)]
struct FingerprintRow {
    name: String,
    display_name: String,
    cleaned: String,
    fingerprint: String,
    category: Category,
}

impl Context {
    pub fn open(home: &Path, analyzer: FieldAnalyzer, planner: FillPlanner) -> Result<Self> {
        let workspace = TemplateWorkspace::open(home)
            .with_context(|| format!("Failed to open workspace {}", home.display()))?;
        log::debug!(
            "group floor {}, propagation floor {}",
            analyzer.grouper().min_group_confidence(),
            planner.min_propagation_confidence()
        );
        Ok(Self {
            workspace,
            analyzer,
            planner,
        })
    }

    pub fn upload(&self, file: &Path, name: Option<&str>) -> Result<CommandResponse> {
        let stored = self
            .workspace
            .save_template(file, name)
            .with_context(|| format!("Failed to store template {}", file.display()))?;
        let discovery = self.discovery().discover(&stored.path);
        let response = CommandResponse::ok(json!({
            "template": stored,
            "field_count": discovery.fields.len(),
            "source": discovery.source,
        }))?
        .with_message(format!("stored template {}", stored.id));
        Ok(if discovery.is_placeholder() {
            response.with_hint("no fields could be read; placeholder fields will be offered")
        } else {
            response
        })
    }

    pub fn list(&self) -> Result<CommandResponse> {
        let templates = self.workspace.list_templates()?;
        CommandResponse::ok(json!({ "templates": templates }))
    }

    pub fn fields(&self, template: &str) -> Result<CommandResponse> {
        let template = self.resolve_template(template)?;
        let mapping = self.stored_mapping(&template)?;
        let discovery = self.discovery().discover(&template.path);
        let profile = TemplateProfile::build(&self.analyzer, discovery, mapping);
        let placeholder = profile.source == formfill_engine::DiscoverySource::Placeholder;

        let response = CommandResponse::ok(json!({
            "template": template.id,
            "path": template.path,
            "profile": profile,
            "thresholds": {
                "min_group_confidence": self.analyzer.grouper().min_group_confidence(),
                "min_propagation_confidence": self.planner.min_propagation_confidence(),
            },
        }))?;
        Ok(if placeholder {
            response.with_hint("no fields could be read; showing the placeholder field set")
        } else {
            response
        })
    }

    pub fn fingerprint(
        &self,
        names: &[String],
        declared_type: Option<String>,
        declared_format: Option<String>,
    ) -> Result<CommandResponse> {
        let hints = FieldHints::new(declared_type, declared_format);
        let hints = (!hints.is_empty()).then_some(&hints);
        let rows: Vec<FingerprintRow> = names
            .iter()
            .map(|name| FingerprintRow {
                display_name: self.analyzer.display_name(name),
                cleaned: self.analyzer.fingerprinter().cleaned_name(name),
                fingerprint: self.analyzer.fingerprint(name, hints).to_string(),
                category: self.analyzer.category_of(name),
                name: name.clone(),
            })
            .collect();
        CommandResponse::ok(json!({ "fields": rows }))
    }

    pub fn map(&self, template: &str, edits: &MapEdits) -> Result<CommandResponse> {
        let path = self.workspace.template_path(template)?;
        let mut mapping = if edits.clear {
            FieldMapping::new()
        } else {
            self.workspace.field_mapping(template)?
        };

        let discovery = self.discovery().discover(&path);
        let categories = self.analyzer.categorize(discovery.field_names());
        let groups = self.analyzer.confident_groups(discovery.fingerprints());
        let mut hints = Vec::new();

        for (category, attribute) in &edits.category {
            let category: Category = category.parse()?;
            let touched = mapping.assign_category(&categories, category, attribute);
            if touched == 0 {
                hints.push(format!("category {category} has no fields"));
            }
        }
        for (semantic_type, attribute) in &edits.group {
            let touched = mapping.assign_group(&groups, semantic_type, attribute);
            if touched == 0 {
                hints.push(format!("no semantic group '{semantic_type}' in this template"));
            }
        }
        for (field, attribute) in &edits.set {
            if discovery.field(field).is_none() {
                hints.push(format!("field '{field}' was not discovered in this template"));
            }
            mapping.insert(field.as_str(), attribute.as_str());
        }
        for field in &edits.unset {
            if mapping.remove(field).is_none() {
                hints.push(format!("field '{field}' was not mapped"));
            }
        }

        self.workspace.save_mapping(template, &mapping)?;
        log::info!("saved {} mapping(s) for {template}", mapping.len());

        let progress = mapping.progress(discovery.field_names());
        let mut response = CommandResponse::ok(json!({
            "template": template,
            "mappings": mapping,
            "progress": progress,
        }))?;
        for hint in hints {
            response = response.with_hint(hint);
        }
        Ok(response)
    }

    pub fn record(&self, id: &str, file: &Path) -> Result<CommandResponse> {
        let record = read_record(file)?;
        self.workspace.save_record(id, &record)?;
        CommandResponse::ok(json!({ "record": id, "attributes": record.len() }))
            .map(|r| r.with_message(format!("stored record {id}")))
    }

    pub fn fill(
        &self,
        template: &str,
        record: &str,
        mapping: Option<&Path>,
        output: Option<&Path>,
    ) -> Result<CommandResponse> {
        let template = self.resolve_template(template)?;
        let record = if Path::new(record).is_file() {
            read_record(Path::new(record))?
        } else {
            self.workspace.load_record(record)?
        };
        let mapping = match mapping {
            Some(path) => {
                let bytes = fs::read(path)
                    .with_context(|| format!("Failed to read mapping {}", path.display()))?;
                serde_json::from_slice(&bytes)
                    .with_context(|| format!("Invalid mapping {}", path.display()))?
            }
            None => self.stored_mapping(&template)?,
        };
        let output = match output {
            Some(path) => path.to_path_buf(),
            None => self.workspace.output_path()?,
        };

        let service = FillService::acroform(self.analyzer.clone()).with_planner(self.planner);
        let outcome = service.fill(&template.path, &mapping, &record, &output)?;

        let message = format!(
            "{} field(s) staged ({} explicit, {} propagated): {}",
            outcome.plan.values.len(),
            outcome.plan.explicit.len(),
            outcome.plan.propagated.len(),
            outcome.status
        );
        let degraded = outcome.status.is_degraded();
        let missing = outcome.plan.missing_attributes.len();
        let mut response = CommandResponse::ok(json!({
            "output": outcome.output,
            "status": outcome.status,
            "source": outcome.discovery.source,
            "values": outcome.plan.values,
            "explicit": outcome.plan.explicit,
            "propagated": outcome.plan.propagated,
            "missing_attributes": outcome.plan.missing_attributes,
        }))?
        .with_message(message);
        if degraded {
            response = response.with_hint("the output is an unfilled copy of the template");
        }
        if missing > 0 {
            response = response.with_hint(format!(
                "{missing} mapped attribute(s) are missing from the record"
            ));
        }
        Ok(response)
    }

    pub fn delete(&self, template: &str) -> Result<CommandResponse> {
        self.workspace.delete_template(template)?;
        CommandResponse::ok(json!({ "template": template, "deleted": true }))
    }

    fn discovery(&self) -> FieldDiscovery {
        FieldDiscovery::with_default_readers(self.analyzer.clone())
    }

    fn resolve_template(&self, template: &str) -> Result<ResolvedTemplate> {
        match self.workspace.template_path(template) {
            Ok(path) => Ok(ResolvedTemplate {
                id: Some(template.to_string()),
                path,
            }),
            Err(_) if Path::new(template).is_file() => Ok(ResolvedTemplate {
                id: None,
                path: PathBuf::from(template),
            }),
            Err(EngineError::InvalidName(_)) => {
                Err(EngineError::NotFound(format!("template '{template}'")).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn stored_mapping(&self, template: &ResolvedTemplate) -> Result<FieldMapping> {
        match &template.id {
            Some(id) => Ok(self.workspace.field_mapping(id)?),
            None => Ok(FieldMapping::new()),
        }
    }
}

fn read_record(path: &Path) -> Result<formfill_engine::RecordMap> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read record {}", path.display()))?;
    record_from_json(&bytes).with_context(|| format!("Invalid record {}", path.display()))
}
