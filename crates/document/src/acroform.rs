//! AcroForm access on top of `lopdf`.
//!
//! Field names are fully qualified: partial names (`/T`) of ancestors joined
//! with `.`. Widget annotations without their own `/T` belong to the parent
//! field. `/FT` is inheritable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::capability::{DocumentReader, DocumentWriter, RawField};
use crate::{DocumentError, Result};

const MAX_FIELD_DEPTH: usize = 32;
const UTF16_BOM: [u8; 2] = [0xFE, 0xFF];

/// Terminal field found while walking the field tree.
#[derive(Debug, Clone)]
struct FieldNode {
    id: Option<ObjectId>,
    name: String,
    field_type: Option<String>,
    value: Option<Object>,
}

/// Primary reader: walks the whole field hierarchy and reports declared
/// type and default-value kind for each terminal field.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcroFormReader;

impl DocumentReader for AcroFormReader {
    fn name(&self) -> &str {
        "acroform"
    }

    fn read_fields(&self, template: &Path) -> Result<Vec<RawField>> {
        let doc = Document::load(template)?;
        let fields = terminal_fields(&doc)?
            .into_iter()
            .map(|node| RawField {
                declared_format: node.value.as_ref().and_then(|v| value_kind(&doc, v)),
                declared_type: node.field_type,
                name: node.name,
            })
            .collect();
        Ok(fields)
    }
}

/// Fallback reader: only the partial names of the top-level `/Fields`
/// entries, no hints. Tolerates entries the primary reader rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldListReader;

impl DocumentReader for FieldListReader {
    fn name(&self) -> &str {
        "field-list"
    }

    fn read_fields(&self, template: &Path) -> Result<Vec<RawField>> {
        let doc = Document::load(template)?;
        let mut fields = Vec::new();
        for entry in top_level_fields(&doc)? {
            let Ok(dict) = resolve(&doc, entry).and_then(|o| Ok(o.as_dict()?)) else {
                log::debug!("field-list: skipping non-dictionary entry");
                continue;
            };
            if let Some(name) = partial_name(&doc, dict) {
                fields.push(RawField::named(name));
            }
        }
        Ok(fields)
    }
}

/// Writes `/V` on matching terminal fields and asks viewers to regenerate
/// appearances.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcroFormWriter;

impl DocumentWriter for AcroFormWriter {
    fn name(&self) -> &str {
        "acroform"
    }

    fn write(
        &self,
        template: &Path,
        values: &BTreeMap<String, String>,
        output: &Path,
    ) -> Result<PathBuf> {
        let mut doc = Document::load(template)?;
        let targets: Vec<(ObjectId, String, Option<String>)> = terminal_fields(&doc)?
            .into_iter()
            .filter(|node| values.contains_key(&node.name))
            .filter_map(|node| match node.id {
                Some(id) => Some((id, node.name, node.field_type)),
                None => {
                    log::warn!("field '{}' is a direct object; not writable", node.name);
                    None
                }
            })
            .collect();

        for (id, name, field_type) in &targets {
            let Some(value) = values.get(name) else {
                continue;
            };
            let encoded = if field_type.as_deref() == Some("Btn") {
                Object::Name(value.as_bytes().to_vec())
            } else {
                encode_text(value)
            };
            doc.get_object_mut(*id)?.as_dict_mut()?.set("V", encoded);
        }

        let ignored = values.len().saturating_sub(targets.len());
        if ignored > 0 {
            log::debug!("{ignored} value(s) had no matching field and were ignored");
        }

        set_need_appearances(&mut doc)?;
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        doc.save(output)?;
        Ok(output.to_path_buf())
    }
}

/// Current text value of every terminal field (empty fields omitted).
pub fn field_values(template: &Path) -> Result<BTreeMap<String, String>> {
    let doc = Document::load(template)?;
    let mut values = BTreeMap::new();
    for node in terminal_fields(&doc)? {
        let text = match node.value.as_ref().map(|v| resolve(&doc, v)).transpose()? {
            Some(Object::String(bytes, _)) => decode_text(bytes),
            Some(Object::Name(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
            _ => continue,
        };
        if !text.is_empty() {
            values.insert(node.name, text);
        }
    }
    Ok(values)
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

fn acroform(doc: &Document) -> Result<&Dictionary> {
    let root = resolve(doc, doc.trailer.get(b"Root")?)?.as_dict()?;
    let form = root.get(b"AcroForm").map_err(|_| DocumentError::NoAcroForm)?;
    Ok(resolve(doc, form)?.as_dict()?)
}

fn top_level_fields(doc: &Document) -> Result<Vec<&Object>> {
    let fields = acroform(doc)?
        .get(b"Fields")
        .map_err(|_| DocumentError::NoAcroForm)?;
    Ok(resolve(doc, fields)?.as_array()?.iter().collect())
}

fn terminal_fields(doc: &Document) -> Result<Vec<FieldNode>> {
    let mut out = Vec::new();
    for entry in top_level_fields(doc)? {
        walk(doc, entry, None, None, 0, &mut out)?;
    }
    Ok(out)
}

fn walk(
    doc: &Document,
    entry: &Object,
    parent_name: Option<&str>,
    inherited_type: Option<&str>,
    depth: usize,
    out: &mut Vec<FieldNode>,
) -> Result<()> {
    if depth > MAX_FIELD_DEPTH {
        return Err(DocumentError::MalformedFieldTree(format!(
            "nesting deeper than {MAX_FIELD_DEPTH} levels"
        )));
    }
    let id = match entry {
        Object::Reference(id) => Some(*id),
        _ => None,
    };
    let dict = resolve(doc, entry)?.as_dict()?;

    let name = match (parent_name, partial_name(doc, dict)) {
        (Some(parent), Some(partial)) => format!("{parent}.{partial}"),
        (None, Some(partial)) => partial,
        (Some(parent), None) => parent.to_string(),
        (None, None) => {
            return Err(DocumentError::MalformedFieldTree(
                "top-level field without a name".to_string(),
            ))
        }
    };
    let field_type = match dict.get(b"FT").ok().map(|o| resolve(doc, o)).transpose()? {
        Some(Object::Name(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => inherited_type.map(str::to_string),
    };

    let mut child_fields = Vec::new();
    if let Ok(kids) = dict.get(b"Kids") {
        for kid in resolve(doc, kids)?.as_array()? {
            let kid_dict = resolve(doc, kid)?.as_dict()?;
            if kid_dict.has(b"T") {
                child_fields.push(kid);
            }
        }
    }

    if child_fields.is_empty() {
        out.push(FieldNode {
            id,
            name,
            field_type,
            value: dict.get(b"V").ok().cloned(),
        });
        return Ok(());
    }
    for kid in child_fields {
        walk(doc, kid, Some(&name), field_type.as_deref(), depth + 1, out)?;
    }
    Ok(())
}

fn partial_name(doc: &Document, dict: &Dictionary) -> Option<String> {
    let title = resolve(doc, dict.get(b"T").ok()?).ok()?;
    match title {
        Object::String(bytes, _) => Some(decode_text(bytes)).filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn value_kind(doc: &Document, value: &Object) -> Option<String> {
    let kind = match resolve(doc, value).ok()? {
        Object::String(..) => "string",
        Object::Name(_) => "name",
        Object::Integer(_) | Object::Real(_) => "number",
        Object::Boolean(_) => "boolean",
        Object::Array(_) => "array",
        Object::Dictionary(_) => "dictionary",
        Object::Stream(_) => "stream",
        _ => return None,
    };
    Some(kind.to_string())
}

fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&UTF16_BOM[..]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // PDFDocEncoding agrees with Latin-1 for printable characters
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn encode_text(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }
    let mut bytes = UTF16_BOM.to_vec();
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn set_need_appearances(doc: &mut Document) -> Result<()> {
    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    let form_ref = match doc.get_object(root_id)?.as_dict()?.get(b"AcroForm") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(_) => return Err(DocumentError::NoAcroForm),
    };
    let form = match form_ref {
        Some(id) => doc.get_object_mut(id)?.as_dict_mut()?,
        None => doc
            .get_object_mut(root_id)?
            .as_dict_mut()?
            .get_mut(b"AcroForm")?
            .as_dict_mut()?,
    };
    form.set("NeedAppearances", Object::Boolean(true));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf16_and_latin1_titles() {
        let utf16 = [0xFE, 0xFF, 0x00, 0x4E, 0x00, 0xE4, 0x00, 0x6D];
        assert_eq!(decode_text(&utf16), "Näm");
        assert_eq!(decode_text(b"plain"), "plain");
        assert_eq!(decode_text(&[0x4E, 0xE4]), "Nä");
    }

    #[test]
    fn encodes_non_ascii_as_utf16() {
        match encode_text("Zoë") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(&bytes[..2], &UTF16_BOM);
                assert_eq!(decode_text(&bytes), "Zoë");
            }
            other => panic!("unexpected encoding {other:?}"),
        }
        assert!(matches!(
            encode_text("A123"),
            Object::String(_, StringFormat::Literal)
        ));
    }
}
