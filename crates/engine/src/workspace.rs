//! Directory-backed template, mapping and record storage.
//!
//! ```text
//! <home>/
//!   templates/<YYYYmmddHHMMSS>_<hex>_<original>.pdf
//!   mappings/<template id>.json
//!   records/<record id>.json
//!   outputs/<YYYYmmddHHMMSS>_<hex>.pdf
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use getrandom::getrandom;
use serde::Serialize;

use crate::mapping::{FieldMapping, TemplateStore};
use crate::record::{record_from_json, RecordMap, RecordStore};
use crate::{EngineError, Result};

pub const TEMPLATES_DIR_NAME: &str = "templates";
pub const MAPPINGS_DIR_NAME: &str = "mappings";
pub const RECORDS_DIR_NAME: &str = "records";
pub const OUTPUTS_DIR_NAME: &str = "outputs";

const TEMPLATE_EXTENSION: &str = "pdf";
const UNIQUE_SUFFIX_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredTemplate {
    /// File name inside `templates/`; doubles as the template id
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TemplateWorkspace {
    home: PathBuf,
}

impl TemplateWorkspace {
    /// Open (and create if needed) a workspace rooted at `home`.
    pub fn open(home: impl Into<PathBuf>) -> Result<Self> {
        let workspace = Self { home: home.into() };
        for dir in [
            TEMPLATES_DIR_NAME,
            MAPPINGS_DIR_NAME,
            RECORDS_DIR_NAME,
            OUTPUTS_DIR_NAME,
        ] {
            fs::create_dir_all(workspace.home.join(dir))?;
        }
        Ok(workspace)
    }

    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Copy a `.pdf` file into the workspace under a collision-resistant name.
    pub fn save_template(&self, source: &Path, name: Option<&str>) -> Result<StoredTemplate> {
        let original = match name {
            Some(name) => name.to_string(),
            None => source
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| EngineError::InvalidName(source.display().to_string()))?
                .to_string(),
        };
        if !has_template_extension(&original) {
            return Err(EngineError::UnsupportedTemplate(PathBuf::from(original)));
        }
        validate_id(&original)?;

        let id = format!("{}_{original}", unique_stem()?);
        let path = self.home.join(TEMPLATES_DIR_NAME).join(&id);
        fs::copy(source, &path)?;
        log::info!("stored template {} as {id}", source.display());
        Ok(StoredTemplate { id, path })
    }

    pub fn template_path(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        let path = self.home.join(TEMPLATES_DIR_NAME).join(id);
        if !path.is_file() {
            return Err(EngineError::NotFound(format!("template '{id}'")));
        }
        Ok(path)
    }

    /// Stored templates, oldest first.
    pub fn list_templates(&self) -> Result<Vec<StoredTemplate>> {
        let mut templates = Vec::new();
        for entry in fs::read_dir(self.home.join(TEMPLATES_DIR_NAME))? {
            let entry = entry?;
            let path = entry.path();
            let Some(id) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            if path.is_file() && has_template_extension(&id) {
                templates.push(StoredTemplate { id, path });
            }
        }
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(templates)
    }

    /// Remove a template together with its stored mapping.
    pub fn delete_template(&self, id: &str) -> Result<()> {
        let path = self.template_path(id)?;
        fs::remove_file(&path)?;
        let mapping = self.mapping_path(id);
        if mapping.exists() {
            fs::remove_file(&mapping)?;
        }
        log::info!("deleted template {id}");
        Ok(())
    }

    pub fn save_mapping(&self, template: &str, mapping: &FieldMapping) -> Result<()> {
        self.template_path(template)?;
        write_json(&self.mapping_path(template), mapping)
    }

    pub fn save_record(&self, id: &str, record: &RecordMap) -> Result<()> {
        validate_id(id)?;
        write_json(&self.record_path(id), record)
    }

    /// Fresh output path; nothing is created yet.
    pub fn output_path(&self) -> Result<PathBuf> {
        Ok(self
            .home
            .join(OUTPUTS_DIR_NAME)
            .join(format!("{}.{TEMPLATE_EXTENSION}", unique_stem()?)))
    }

    fn mapping_path(&self, template: &str) -> PathBuf {
        self.home
            .join(MAPPINGS_DIR_NAME)
            .join(format!("{template}.json"))
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.home.join(RECORDS_DIR_NAME).join(format!("{id}.json"))
    }
}

impl TemplateStore for TemplateWorkspace {
    fn field_mapping(&self, template: &str) -> Result<FieldMapping> {
        self.template_path(template)?;
        let path = self.mapping_path(template);
        if !path.exists() {
            return Ok(FieldMapping::default());
        }
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }
}

impl RecordStore for TemplateWorkspace {
    fn load_record(&self, id: &str) -> Result<RecordMap> {
        validate_id(id)?;
        let path = self.record_path(id);
        if !path.is_file() {
            return Err(EngineError::NotFound(format!("record '{id}'")));
        }
        record_from_json(&fs::read(path)?)
    }
}

fn has_template_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(TEMPLATE_EXTENSION))
}

/// Ids are plain file names: no separators, no parent references.
fn validate_id(id: &str) -> Result<()> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.chars().any(char::is_control);
    if invalid {
        return Err(EngineError::InvalidName(id.to_string()));
    }
    Ok(())
}

/// `<YYYYmmddHHMMSS>_<32 hex>`
fn unique_stem() -> Result<String> {
    let mut bytes = [0u8; UNIQUE_SUFFIX_BYTES];
    getrandom(&mut bytes).map_err(|err| EngineError::Randomness(err.to_string()))?;
    let mut stem = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
    stem.push('_');
    for b in bytes {
        let _ = write!(stem, "{b:02x}");
    }
    Ok(stem)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
