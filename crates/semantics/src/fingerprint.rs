use std::borrow::Cow;
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::normalize::Normalizer;
use crate::rules::FingerprintRules;
use crate::{Result, SemanticsError};

/// Semantic type emitted when no rule clears the confidence floor.
pub const UNCLASSIFIED: &str = "unclassified";

const DIGEST_HEX_LEN: usize = 8;

/// Structural hints read from the document next to the field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_format: Option<String>,
}

impl FieldHints {
    #[must_use]
    pub fn new(declared_type: Option<String>, declared_format: Option<String>) -> Self {
        Self {
            declared_type: declared_type.filter(|t| !t.is_empty()),
            declared_format: declared_format.filter(|f| !f.is_empty()),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.declared_type.is_none() && self.declared_format.is_none()
    }
}

/// Semantic identity of a field: `(semantic_type, confidence)` plus hints.
///
/// Serialized as its string form, e.g. `email:0.83`, `email:0.83:type=Tx`
/// or `unclassified:9fae21bc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    semantic_type: String,
    confidence: f32,
    digest: Option<String>,
    hints: FieldHints,
}

impl Fingerprint {
    /// Confidence is clamped to `0..=1` and rounded to two decimals so the
    /// struct and its string form always agree.
    #[must_use]
    pub fn classified(semantic_type: impl Into<String>, confidence: f32) -> Self {
        Self {
            semantic_type: semantic_type.into(),
            confidence: round2(confidence.clamp(0.0, 1.0)),
            digest: None,
            hints: FieldHints::default(),
        }
    }

    #[must_use]
    pub fn unclassified(digest: impl Into<String>) -> Self {
        Self {
            semantic_type: UNCLASSIFIED.to_string(),
            confidence: 0.0,
            digest: Some(digest.into()),
            hints: FieldHints::default(),
        }
    }

    /// Attach hints; unclassified fingerprints never carry them.
    #[must_use]
    pub fn with_hints(mut self, hints: FieldHints) -> Self {
        if self.is_classified() {
            self.hints = hints;
        }
        self
    }

    #[must_use]
    pub fn semantic_type(&self) -> &str {
        &self.semantic_type
    }

    #[must_use]
    pub const fn confidence(&self) -> f32 {
        self.confidence
    }

    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    #[must_use]
    pub const fn hints(&self) -> &FieldHints {
        &self.hints
    }

    #[must_use]
    pub const fn is_classified(&self) -> bool {
        self.digest.is_none()
    }

    /// Key under which equivalent fields are grouped. Unclassified fields keep
    /// their digest so unrelated unknown names never cluster together.
    #[must_use]
    pub fn group_key(&self) -> Cow<'_, str> {
        match &self.digest {
            Some(digest) => Cow::Owned(format!("{UNCLASSIFIED}:{digest}")),
            None => Cow::Borrowed(&self.semantic_type),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(digest) = &self.digest {
            return write!(f, "{UNCLASSIFIED}:{digest}");
        }
        write!(f, "{}:{:.2}", self.semantic_type, self.confidence)?;
        if let Some(declared_type) = &self.hints.declared_type {
            write!(f, ":type={declared_type}")?;
        }
        if let Some(declared_format) = &self.hints.declared_format {
            write!(f, ":format={declared_format}")?;
        }
        Ok(())
    }
}

impl FromStr for Fingerprint {
    type Err = SemanticsError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let semantic_type = parts
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SemanticsError::invalid_fingerprint(format!("'{s}' has no type")))?;
        let second = parts.next().ok_or_else(|| {
            SemanticsError::invalid_fingerprint(format!("'{s}' has no confidence or digest"))
        })?;

        if semantic_type == UNCLASSIFIED {
            if parts.next().is_some() {
                return Err(SemanticsError::invalid_fingerprint(format!(
                    "'{s}' has trailing segments"
                )));
            }
            return Ok(Self::unclassified(second));
        }

        let confidence: f32 = second.parse().map_err(|_| {
            SemanticsError::invalid_fingerprint(format!("'{s}' has a non-numeric confidence"))
        })?;
        let mut hints = FieldHints::default();
        for part in parts {
            match part.split_once('=') {
                Some(("type", value)) => hints.declared_type = Some(value.to_string()),
                Some(("format", value)) => hints.declared_format = Some(value.to_string()),
                _ => {
                    return Err(SemanticsError::invalid_fingerprint(format!(
                        "'{s}' has unknown segment '{part}'"
                    )))
                }
            }
        }
        Ok(Self::classified(semantic_type, confidence).with_hints(hints))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Keyword-scoring classifier mapping field names to fingerprints.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    normalizer: Normalizer,
    rules: FingerprintRules,
}

impl Fingerprinter {
    #[must_use]
    pub const fn new(normalizer: Normalizer, rules: FingerprintRules) -> Self {
        Self { normalizer, rules }
    }

    #[must_use]
    pub const fn rules(&self) -> &FingerprintRules {
        &self.rules
    }

    /// Normalized, lowercased name with digits, positional terms and form noise removed.
    #[must_use]
    pub fn cleaned_name(&self, raw: &str) -> String {
        let normalized = self.normalizer.normalize(raw).to_lowercase();
        let without_digits: String = normalized.chars().filter(|c| !c.is_ascii_digit()).collect();
        without_digits
            .split_whitespace()
            .filter(|token| !self.rules.is_ignored_term(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[must_use]
    pub fn fingerprint(&self, raw: &str, hints: Option<&FieldHints>) -> Fingerprint {
        let cleaned = self.cleaned_name(raw);
        // Underscores separate words in raw identifiers, so `contact_email`
        // still counts as a whole-word hit for `email`.
        let raw_words = raw.to_lowercase().replace('_', " ");

        let mut best: Option<(&str, f32)> = None;
        for rule in self.rules.semantic_types() {
            let keywords = rule.keywords();
            let hits = keywords.iter().filter(|k| k.occurs_in(&cleaned)).count();
            let mut confidence = hits as f32 / keywords.len() as f32;
            if keywords.iter().any(|k| k.is_whole_word_in(&raw_words)) {
                confidence += self.rules.whole_word_bonus();
            }
            if confidence > best.map_or(0.0, |(_, c)| c) {
                best = Some((rule.name(), confidence));
            }
        }

        match best {
            Some((semantic_type, confidence)) if confidence >= self.rules.min_confidence() => {
                log::debug!("fingerprint '{raw}' -> {semantic_type} ({confidence:.2})");
                Fingerprint::classified(semantic_type, confidence)
                    .with_hints(hints.cloned().unwrap_or_default())
            }
            _ => {
                log::debug!("fingerprint '{raw}' unclassified (cleaned '{cleaned}')");
                Fingerprint::unclassified(content_digest(&cleaned))
            }
        }
    }
}

fn content_digest(cleaned: &str) -> String {
    let hash = Sha256::digest(cleaned.as_bytes());
    let mut out = String::with_capacity(DIGEST_HEX_LEN);
    for b in hash.iter().take(DIGEST_HEX_LEN / 2) {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
