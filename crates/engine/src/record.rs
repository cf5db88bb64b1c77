use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;

use chrono::NaiveDate;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Date layout used whenever a date reaches a form field.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Primitive attribute value of a record.
///
/// Only strings already in canonical `YYYY-MM-DD` form become dates, so a
/// value always renders back to the text it was read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl RecordValue {
    /// String form written into a field.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Text, or a date when `text` is exactly a `YYYY-MM-DD` day.
    #[must_use]
    pub fn parse_text(text: &str) -> Self {
        match NaiveDate::parse_from_str(text, DATE_FORMAT) {
            Ok(date) if date.format(DATE_FORMAT).to_string() == text => Self::Date(date),
            _ => Self::Text(text.to_string()),
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Unsigned(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{}", value.format(DATE_FORMAT)),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl<'de> Deserialize<'de> for RecordValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RecordValueVisitor)
    }
}

struct RecordValueVisitor;

impl Visitor<'_> for RecordValueVisitor {
    type Value = RecordValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number or boolean")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<RecordValue, E> {
        Ok(RecordValue::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<RecordValue, E> {
        Ok(RecordValue::Integer(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<RecordValue, E> {
        Ok(i64::try_from(value).map_or(RecordValue::Unsigned(value), RecordValue::Integer))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<RecordValue, E> {
        Ok(RecordValue::Float(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<RecordValue, E> {
        Ok(RecordValue::parse_text(value))
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for RecordValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u64> for RecordValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::Unsigned(value), Self::Integer)
    }
}

impl From<f64> for RecordValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for RecordValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for RecordValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Flat attribute lookup. The planner never iterates a record.
pub trait Record {
    fn get(&self, attribute: &str) -> Option<&RecordValue>;

    fn contains(&self, attribute: &str) -> bool {
        self.get(attribute).is_some()
    }
}

pub type RecordMap = BTreeMap<String, RecordValue>;

impl Record for BTreeMap<String, RecordValue> {
    fn get(&self, attribute: &str) -> Option<&RecordValue> {
        BTreeMap::get(self, attribute)
    }
}

impl<S: BuildHasher> Record for HashMap<String, RecordValue, S> {
    fn get(&self, attribute: &str) -> Option<&RecordValue> {
        HashMap::get(self, attribute)
    }
}

/// Source of records by id.
pub trait RecordStore {
    fn load_record(&self, id: &str) -> Result<RecordMap>;
}

/// Parse a flat JSON object into a record. `null` attributes are treated as
/// absent; nested values are rejected.
pub fn record_from_json(bytes: &[u8]) -> Result<RecordMap> {
    let raw: BTreeMap<String, Option<RecordValue>> = serde_json::from_slice(bytes)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dates_render_as_iso_days() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 15).unwrap();
        assert_eq!(RecordValue::Date(date).render(), "2020-01-15");
    }

    #[test]
    fn primitives_render_plainly() {
        assert_eq!(RecordValue::from(42_i64).render(), "42");
        assert_eq!(RecordValue::from(2.5).render(), "2.5");
        assert_eq!(RecordValue::from(true).render(), "true");
        assert_eq!(RecordValue::from("A123").render(), "A123");
    }

    #[test]
    fn json_records_detect_dates_and_drop_nulls() {
        let record = record_from_json(
            br#"{"id_number": "A123", "birth": "2020-01-15", "age": 31, "vip": false, "note": null}"#,
        )
        .unwrap();
        assert_eq!(record.get("id_number"), Some(&RecordValue::from("A123")));
        assert_eq!(
            record.get("birth"),
            Some(&RecordValue::Date(NaiveDate::from_ymd_opt(2020, 1, 15).unwrap()))
        );
        assert_eq!(record.get("age"), Some(&RecordValue::Integer(31)));
        assert_eq!(record.get("vip"), Some(&RecordValue::Bool(false)));
        assert!(!Record::contains(&record, "note"));
    }

    #[test]
    fn non_canonical_dates_stay_text() {
        let record = record_from_json(
            br#"{"a": "2020-1-5", "b": " 2020-01-15", "c": "+2020-01-15", "d": "2020-01-15"}"#,
        )
        .unwrap();
        assert_eq!(record["a"], RecordValue::from("2020-1-5"));
        assert_eq!(record["b"].render(), " 2020-01-15");
        assert_eq!(record["c"].render(), "+2020-01-15");
        assert!(matches!(record["d"], RecordValue::Date(_)));
    }

    #[test]
    fn large_integers_keep_every_digit() {
        let record =
            record_from_json(br#"{"account": 12345678901234567890, "small": 7}"#).unwrap();
        assert_eq!(record["account"], RecordValue::Unsigned(12_345_678_901_234_567_890));
        assert_eq!(record["account"].render(), "12345678901234567890");
        assert_eq!(record["small"], RecordValue::Integer(7));
    }

    #[test]
    fn nested_values_are_rejected() {
        assert!(record_from_json(br#"{"address": {"city": "Paris"}}"#).is_err());
        assert!(record_from_json(br#"["not", "an", "object"]"#).is_err());
    }

    #[test]
    fn hash_map_records_work_too() {
        let record: HashMap<String, RecordValue> =
            HashMap::from([("email".to_string(), RecordValue::from("a@b.c"))]);
        assert!(record.contains("email"));
        assert!(!record.contains("phone"));
    }
}
