use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use formfill_document::{DocumentError, DocumentReader, DocumentWriter, RawField};
use formfill_engine::{
    DiscoverySource, FieldDiscovery, FieldMapping, FillService, FillStatus, RecordMap,
    RecordValue, TemplateStore, TemplateWorkspace,
};
use formfill_semantics::FieldAnalyzer;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

/// Reports the field ids it was built with.
struct StaticReader(Vec<&'static str>);

impl DocumentReader for StaticReader {
    fn name(&self) -> &str {
        "static"
    }

    fn read_fields(&self, _template: &Path) -> formfill_document::Result<Vec<RawField>> {
        Ok(self.0.iter().map(|n| RawField::named(*n)).collect())
    }
}

/// Writes the received values as JSON instead of a document.
struct JsonWriter;

impl DocumentWriter for JsonWriter {
    fn name(&self) -> &str {
        "json"
    }

    fn write(
        &self,
        _template: &Path,
        values: &BTreeMap<String, String>,
        output: &Path,
    ) -> formfill_document::Result<PathBuf> {
        let bytes = serde_json::to_vec(values).map_err(|e| DocumentError::Other(e.to_string()))?;
        fs::write(output, bytes)?;
        Ok(output.to_path_buf())
    }
}

/// Writes next to the requested path and reports where it went.
struct RedirectingWriter;

impl DocumentWriter for RedirectingWriter {
    fn name(&self) -> &str {
        "redirecting"
    }

    fn write(
        &self,
        template: &Path,
        values: &BTreeMap<String, String>,
        output: &Path,
    ) -> formfill_document::Result<PathBuf> {
        let target = output.with_extension("final.json");
        JsonWriter.write(template, values, &target)
    }
}

struct FailingWriter;

impl DocumentWriter for FailingWriter {
    fn name(&self) -> &str {
        "failing"
    }

    fn write(
        &self,
        _template: &Path,
        _values: &BTreeMap<String, String>,
        _output: &Path,
    ) -> formfill_document::Result<PathBuf> {
        Err(DocumentError::Other("disk on fire".to_string()))
    }
}

fn written_values(path: &Path) -> BTreeMap<String, String> {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn service(fields: Vec<&'static str>, writer: impl DocumentWriter + 'static) -> FillService {
    let discovery = FieldDiscovery::new(FieldAnalyzer::builtin()).with_reader(StaticReader(fields));
    FillService::new(discovery, writer)
}

#[test]
fn one_mapping_fills_every_equivalent_field() {
    let dir = tempdir().unwrap();
    let template = dir.path().join("form.pdf");
    fs::write(&template, b"template").unwrap();
    let output = dir.path().join("out.json");

    let service = service(vec!["customer_id", "id_verification", "email"], JsonWriter);
    let mapping: FieldMapping = [("customer_id", "id_number")].into_iter().collect();
    let record = RecordMap::from([("id_number".to_string(), RecordValue::from("A123"))]);

    let outcome = service.fill(&template, &mapping, &record, &output).unwrap();
    assert_eq!(outcome.status, FillStatus::Filled);
    assert_eq!(outcome.discovery.source, DiscoverySource::Reader("static".into()));
    assert_eq!(
        written_values(&output),
        BTreeMap::from([
            ("customer_id".to_string(), "A123".to_string()),
            ("id_verification".to_string(), "A123".to_string()),
        ])
    );
}

#[test]
fn own_mapping_takes_precedence_over_propagation() {
    let dir = tempdir().unwrap();
    let template = dir.path().join("form.pdf");
    fs::write(&template, b"template").unwrap();
    let output = dir.path().join("out.json");

    let service = service(vec!["customer_id", "id_verification"], JsonWriter);
    let mapping: FieldMapping = [("customer_id", "id_number"), ("id_verification", "passport")]
        .into_iter()
        .collect();
    let record = RecordMap::from([
        ("id_number".to_string(), RecordValue::from("A123")),
        ("passport".to_string(), RecordValue::from("P-77")),
    ]);

    service.fill(&template, &mapping, &record, &output).unwrap();
    let values = written_values(&output);
    assert_eq!(values["customer_id"], "A123");
    assert_eq!(values["id_verification"], "P-77");
}

#[test]
fn dates_propagate_in_iso_form() {
    let dir = tempdir().unwrap();
    let template = dir.path().join("form.pdf");
    fs::write(&template, b"template").unwrap();
    let output = dir.path().join("out.json");

    let service = service(vec!["date_of_birth", "birth_date"], JsonWriter);
    let mapping: FieldMapping = [("date_of_birth", "dob")].into_iter().collect();
    let record = RecordMap::from([(
        "dob".to_string(),
        RecordValue::from(NaiveDate::from_ymd_opt(2020, 1, 15).unwrap()),
    )]);

    let outcome = service.fill(&template, &mapping, &record, &output).unwrap();
    assert_eq!(outcome.plan.values["date_of_birth"], "2020-01-15");
    assert_eq!(outcome.plan.values["birth_date"], "2020-01-15");
}

#[test]
fn outcome_reports_the_path_the_writer_chose() {
    let dir = tempdir().unwrap();
    let template = dir.path().join("form.pdf");
    fs::write(&template, b"template").unwrap();
    let requested = dir.path().join("out.json");

    let service = service(vec!["email"], RedirectingWriter);
    let mapping: FieldMapping = [("email", "email")].into_iter().collect();
    let record = RecordMap::from([("email".to_string(), RecordValue::from("a@b.c"))]);

    let outcome = service.fill(&template, &mapping, &record, &requested).unwrap();
    assert_eq!(outcome.status, FillStatus::Filled);
    assert_eq!(outcome.output, dir.path().join("out.final.json"));
    assert!(!requested.exists());
    assert_eq!(written_values(&outcome.output)["email"], "a@b.c");
}

#[test]
fn writer_failure_degrades_to_template_copy() {
    let dir = tempdir().unwrap();
    let template = dir.path().join("form.pdf");
    fs::write(&template, b"original bytes").unwrap();
    let output = dir.path().join("nested/out.pdf");

    let service = service(vec!["email"], FailingWriter);
    let mapping: FieldMapping = [("email", "email")].into_iter().collect();
    let record = RecordMap::from([("email".to_string(), RecordValue::from("a@b.c"))]);

    let outcome = service.fill(&template, &mapping, &record, &output).unwrap();
    match &outcome.status {
        FillStatus::Degraded { reason } => assert!(reason.contains("disk on fire"), "{reason}"),
        other => panic!("expected degraded fill, got {other:?}"),
    }
    assert_eq!(outcome.output, output);
    assert_eq!(fs::read(&output).unwrap(), b"original bytes");
}

#[test]
fn zero_field_template_still_produces_output() {
    let dir = tempdir().unwrap();
    let workspace = TemplateWorkspace::open(dir.path().join("home")).unwrap();
    let source = dir.path().join("scan.pdf");
    fs::write(&source, b"not really a pdf").unwrap();
    let stored = workspace.save_template(&source, None).unwrap();

    let service = FillService::acroform(FieldAnalyzer::builtin());
    let mapping: FieldMapping = [("customer_id", "id_number")].into_iter().collect();
    workspace.save_mapping(&stored.id, &mapping).unwrap();
    let record = RecordMap::from([("id_number".to_string(), RecordValue::from("A123"))]);
    let output = workspace.output_path().unwrap();

    let outcome = service
        .fill(
            &stored.path,
            &workspace.field_mapping(&stored.id).unwrap(),
            &record,
            &output,
        )
        .unwrap();

    assert!(outcome.discovery.is_placeholder());
    assert_eq!(outcome.discovery.failures.len(), 2);
    assert!(outcome.discovery.field("customer_id").is_some());
    assert!(outcome.discovery.field("full_name").is_some());
    assert_eq!(outcome.plan.values["id_verification"], "A123");
    assert!(outcome.status.is_degraded());
    assert_eq!(fs::read(&output).unwrap(), b"not really a pdf");
}
