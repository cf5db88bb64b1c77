use std::fs;
use std::path::Path;

use assert_cmd::Command;
use lopdf::{dictionary, Document, Object};
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

#[allow(deprecated)]
fn formfill(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("formfill").expect("binary");
    cmd.env("FORMFILL_HOME", home).env_remove("FORMFILL_RULES");
    cmd
}

fn run_ok(home: &Path, args: &[&str]) -> Value {
    let output = formfill(home).args(args).output().expect("command run");
    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let response: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(response["status"], "ok");
    response
}

/// Single-page form with `customer_id`, `id_verification` and `email`.
fn write_form(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );
    let fields: Vec<Object> = ["customer_id", "id_verification", "email"]
        .into_iter()
        .map(|name| {
            doc.add_object(dictionary! {
                "FT" => "Tx",
                "T" => Object::string_literal(name),
                "V" => Object::string_literal(""),
            })
            .into()
        })
        .collect();
    let form_id = doc.add_object(dictionary! { "Fields" => fields });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => form_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[test]
fn upload_map_and_fill_propagates_values() {
    let temp = tempdir().unwrap();
    let home = temp.path().join("home");
    let source = temp.path().join("application.pdf");
    write_form(&source);

    let upload = run_ok(&home, &["upload", source.to_str().unwrap()]);
    assert_eq!(upload["data"]["field_count"], 3);
    let id = upload["data"]["template"]["id"].as_str().unwrap().to_string();
    assert!(id.ends_with("_application.pdf"));

    let fields = run_ok(&home, &["fields", &id]);
    let profile = &fields["data"]["profile"];
    assert_eq!(profile["source"]["kind"], "reader");
    assert_eq!(profile["source"]["reader"], "acroform");
    let group = profile["semantic_groups"]["id_number"].as_array().unwrap();
    assert_eq!(group.len(), 2);
    assert_eq!(
        profile["fields"][0]["semantic_fingerprint"],
        "id_number:0.67:type=Tx:format=string"
    );

    let mapped = run_ok(&home, &["map", &id, "--set", "customer_id=id_number"]);
    assert_eq!(mapped["data"]["mappings"]["customer_id"], "id_number");
    assert_eq!(mapped["data"]["progress"]["mapped"], 1);

    let record = temp.path().join("client.json");
    fs::write(&record, r#"{"id_number": "A123", "email": "a@b.c"}"#).unwrap();
    let output = temp.path().join("filled.pdf");
    let filled = run_ok(
        &home,
        &[
            "fill",
            &id,
            "--record",
            record.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ],
    );
    assert_eq!(filled["data"]["status"]["state"], "filled");
    assert_eq!(filled["data"]["values"]["id_verification"], "A123");
    assert_eq!(
        filled["data"]["propagated"]["id_verification"]["source_field"],
        "customer_id"
    );

    let written = formfill_document::field_values(&output).unwrap();
    assert_eq!(written.get("customer_id").map(String::as_str), Some("A123"));
    assert_eq!(written.get("id_verification").map(String::as_str), Some("A123"));
    assert!(!written.contains_key("email"));
}

#[test]
fn unreadable_template_falls_back_and_still_fills() {
    let temp = tempdir().unwrap();
    let home = temp.path().join("home");
    let source = temp.path().join("scan.pdf");
    fs::write(&source, b"scanned image, no form").unwrap();

    let upload = run_ok(&home, &["upload", source.to_str().unwrap()]);
    assert_eq!(upload["data"]["source"]["kind"], "placeholder");
    assert!(!upload["hints"].as_array().unwrap().is_empty());
    let id = upload["data"]["template"]["id"].as_str().unwrap().to_string();

    let fields = run_ok(&home, &["fields", &id]);
    let names: Vec<&str> = fields["data"]["profile"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"customer_id"));
    assert!(names.contains(&"full_name"));

    run_ok(&home, &["map", &id, "--group", "id_number=national_id"]);
    let record = temp.path().join("c7.json");
    fs::write(&record, r#"{"national_id": "Z9", "dob": "2020-01-15"}"#).unwrap();
    run_ok(&home, &["record", "client-7", record.to_str().unwrap()]);

    let filled = run_ok(&home, &["fill", &id, "--record", "client-7"]);
    assert_eq!(filled["data"]["status"]["state"], "degraded");
    assert_eq!(filled["data"]["values"]["customer_id"], "Z9");
    let output = filled["data"]["output"].as_str().unwrap();
    assert_eq!(fs::read(output).unwrap(), b"scanned image, no form");
}

#[test]
fn propagation_floor_is_configurable() {
    let temp = tempdir().unwrap();
    let home = temp.path().join("home");
    let source = temp.path().join("application.pdf");
    write_form(&source);
    let upload = run_ok(&home, &["upload", source.to_str().unwrap()]);
    let id = upload["data"]["template"]["id"].as_str().unwrap().to_string();
    run_ok(&home, &["map", &id, "--set", "customer_id=id_number"]);

    let fields = run_ok(&home, &["fields", &id, "--min-propagation-confidence", "0.9"]);
    let floor = fields["data"]["thresholds"]["min_propagation_confidence"]
        .as_f64()
        .unwrap();
    assert!((floor - 0.9).abs() < 1e-6, "{floor}");

    let record = temp.path().join("client.json");
    fs::write(&record, r#"{"id_number": "A123"}"#).unwrap();
    let filled = run_ok(
        &home,
        &[
            "fill",
            &id,
            "--record",
            record.to_str().unwrap(),
            "--output",
            temp.path().join("filled.pdf").to_str().unwrap(),
            "--min-propagation-confidence",
            "0.9",
        ],
    );
    assert_eq!(filled["data"]["values"]["customer_id"], "A123");
    assert!(filled["data"]["values"].get("id_verification").is_none());
    assert!(filled["data"]["propagated"].as_object().unwrap().is_empty());
}

#[test]
fn fingerprint_command_reports_type_and_category() {
    let temp = tempdir().unwrap();
    let response = run_ok(
        temp.path(),
        &["fingerprint", "Bank_Account_Number", "xyz123", "contact_email"],
    );
    let rows = response["data"]["fields"].as_array().unwrap();
    assert_eq!(rows[0]["category"], "banking_info");
    assert_eq!(rows[0]["display_name"], "Bank Account Number");
    assert_eq!(rows[1]["category"], "other");
    assert!(rows[1]["fingerprint"]
        .as_str()
        .unwrap()
        .starts_with("unclassified:"));
    assert_eq!(rows[2]["fingerprint"], "email:0.83");
}

#[test]
fn non_pdf_upload_is_rejected() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("notes.txt");
    fs::write(&source, b"hello").unwrap();

    formfill(temp.path())
        .args(["upload", source.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"status\": \"error\""))
        .stdout(predicate::str::contains("only .pdf files are accepted"));
}

#[test]
fn delete_removes_template() {
    let temp = tempdir().unwrap();
    let home = temp.path().join("home");
    let source = temp.path().join("form.pdf");
    write_form(&source);
    let upload = run_ok(&home, &["upload", source.to_str().unwrap()]);
    let id = upload["data"]["template"]["id"].as_str().unwrap().to_string();

    run_ok(&home, &["delete", &id]);
    let list = run_ok(&home, &["list"]);
    assert!(list["data"]["templates"].as_array().unwrap().is_empty());

    formfill(&home)
        .args(["delete", &id])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Not found"));
}
