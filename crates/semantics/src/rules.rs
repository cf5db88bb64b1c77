//! Rule tables for fingerprinting and categorization.
//!
//! Rules are plain configuration data: a bundled default set (`rules/default.json`)
//! that can be overlaid by an operator-supplied JSON or TOML file. Every section
//! present in the overlay replaces the matching section of the bundled set.

use std::collections::HashSet;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::categorize::Category;
use crate::normalize::{Normalizer, DEFAULT_STRUCTURAL_PREFIX};
use crate::{Result, SemanticsError};

const BUILTIN_RULES: &str = include_str!("../../../rules/default.json");

pub const RULES_SCHEMA_VERSION: u32 = 1;

/// One keyword of a semantic type, with its whole-word matcher precompiled.
#[derive(Debug, Clone)]
pub struct Keyword {
    text: String,
    whole_word: Regex,
}

impl Keyword {
    fn new(text: &str) -> Result<Self> {
        let text = text.trim().to_lowercase();
        let pattern = format!(r"\b{}\b", regex::escape(&text));
        let whole_word =
            Regex::new(&pattern).map_err(|err| SemanticsError::invalid_pattern(&pattern, err))?;
        Ok(Self { text, whole_word })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substring presence, as used for the keyword ratio.
    #[must_use]
    pub fn occurs_in(&self, haystack: &str) -> bool {
        haystack.contains(self.text.as_str())
    }

    #[must_use]
    pub fn is_whole_word_in(&self, haystack: &str) -> bool {
        self.whole_word.is_match(haystack)
    }
}

/// A semantic type and its ordered keyword list.
#[derive(Debug, Clone)]
pub struct SemanticTypeRule {
    name: String,
    keywords: Vec<Keyword>,
}

impl SemanticTypeRule {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }
}

#[derive(Debug, Clone)]
pub struct FingerprintRules {
    semantic_types: Vec<SemanticTypeRule>,
    positional_terms: HashSet<String>,
    noise_terms: HashSet<String>,
    min_confidence: f32,
    whole_word_bonus: f32,
}

impl FingerprintRules {
    /// Semantic types in table order; earlier entries win ties.
    #[must_use]
    pub fn semantic_types(&self) -> &[SemanticTypeRule] {
        &self.semantic_types
    }

    #[must_use]
    pub fn is_ignored_term(&self, token: &str) -> bool {
        self.positional_terms.contains(token) || self.noise_terms.contains(token)
    }

    #[must_use]
    pub const fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    #[must_use]
    pub const fn whole_word_bonus(&self) -> f32 {
        self.whole_word_bonus
    }

    fn from_raw(raw: RawFingerprintRules) -> Result<Self> {
        let min_confidence = raw
            .min_confidence
            .ok_or_else(|| SemanticsError::invalid_rules("fingerprint.min_confidence missing"))?;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(SemanticsError::invalid_rules(format!(
                "fingerprint.min_confidence must be within 0..=1 (got {min_confidence})"
            )));
        }
        let whole_word_bonus = raw.whole_word_bonus.unwrap_or(0.0);
        if whole_word_bonus < 0.0 {
            return Err(SemanticsError::invalid_rules(
                "fingerprint.whole_word_bonus must not be negative",
            ));
        }

        let raw_types = raw.semantic_types.unwrap_or_default();
        if raw_types.is_empty() {
            return Err(SemanticsError::invalid_rules(
                "fingerprint.semantic_types must not be empty",
            ));
        }
        let mut seen = HashSet::new();
        let mut semantic_types = Vec::with_capacity(raw_types.len());
        for raw_type in raw_types {
            let name = raw_type.name.trim().to_string();
            if name.is_empty() || name.contains(':') {
                return Err(SemanticsError::invalid_rules(format!(
                    "fingerprint.semantic_types: invalid type name '{name}'"
                )));
            }
            if name == crate::fingerprint::UNCLASSIFIED {
                return Err(SemanticsError::invalid_rules(
                    "fingerprint.semantic_types: 'unclassified' is reserved",
                ));
            }
            if !seen.insert(name.clone()) {
                return Err(SemanticsError::invalid_rules(format!(
                    "fingerprint.semantic_types: duplicate type '{name}'"
                )));
            }
            let keywords = raw_type
                .keywords
                .iter()
                .filter(|k| !k.trim().is_empty())
                .map(|k| Keyword::new(k))
                .collect::<Result<Vec<_>>>()?;
            if keywords.is_empty() {
                return Err(SemanticsError::invalid_rules(format!(
                    "fingerprint.semantic_types.{name}: keywords must not be empty"
                )));
            }
            semantic_types.push(SemanticTypeRule { name, keywords });
        }

        Ok(Self {
            semantic_types,
            positional_terms: lowercase_set(raw.positional_terms.unwrap_or_default()),
            noise_terms: lowercase_set(raw.noise_terms.unwrap_or_default()),
            min_confidence,
            whole_word_bonus,
        })
    }
}

/// Ordered category pattern lists; `other` is the implicit fallback.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<(Category, Vec<Regex>)>,
}

impl CategoryRules {
    /// First category (in declared order) with a matching pattern.
    #[must_use]
    pub fn classify(&self, normalized: &str) -> Option<Category> {
        self.rules
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(normalized)))
            .map(|(category, _)| *category)
    }

    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        self.rules.iter().map(|(category, _)| *category).collect()
    }

    fn from_raw(raw: Vec<RawCategoryRule>) -> Result<Self> {
        let mut rules: Vec<(Category, Vec<Regex>)> = Vec::with_capacity(raw.len());
        for rule in raw {
            if rule.category == Category::Other {
                return Err(SemanticsError::invalid_rules(
                    "categories: 'other' is the fallback and takes no patterns",
                ));
            }
            if rules.iter().any(|(category, _)| *category == rule.category) {
                return Err(SemanticsError::invalid_rules(format!(
                    "categories: duplicate category '{}'",
                    rule.category
                )));
            }
            let mut patterns = Vec::with_capacity(rule.patterns.len());
            for pattern in rule.patterns.iter().filter(|p| !p.trim().is_empty()) {
                let re = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| SemanticsError::invalid_pattern(pattern, err))?;
                patterns.push(re);
            }
            rules.push((rule.category, patterns));
        }
        // Declared order is the enum order, whatever order the file lists them in.
        rules.sort_by_key(|(category, _)| *category);
        Ok(Self { rules })
    }
}

/// Complete rule set consumed by the analyzers.
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    normalizer: Normalizer,
    fingerprint: FingerprintRules,
    categories: CategoryRules,
}

impl RuleSet {
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_raw("builtin", builtin_raw()).expect("bundled rules must parse")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("custom")
            .to_string();
        Self::from_bytes(&name, &bytes)
    }

    /// Parse an overlay (JSON or TOML) and merge it over the bundled rules.
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let overlay = parse_raw(bytes)?;
        Self::from_raw(name, merge_raw(builtin_raw(), overlay))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    #[must_use]
    pub const fn fingerprint(&self) -> &FingerprintRules {
        &self.fingerprint
    }

    #[must_use]
    pub const fn categories(&self) -> &CategoryRules {
        &self.categories
    }

    fn from_raw(name: &str, raw: RawRuleSet) -> Result<Self> {
        if let Some(version) = raw.schema_version {
            if version != RULES_SCHEMA_VERSION {
                return Err(SemanticsError::UnsupportedSchema(version));
            }
        }
        let prefix = raw
            .normalizer
            .and_then(|n| n.structural_prefix)
            .unwrap_or_else(|| DEFAULT_STRUCTURAL_PREFIX.to_string());
        let normalizer = Normalizer::with_prefix_pattern(&prefix)?;
        let fingerprint = FingerprintRules::from_raw(raw.fingerprint.unwrap_or_default())?;
        let categories = CategoryRules::from_raw(raw.categories.unwrap_or_default())?;
        log::debug!(
            "Loaded rules '{name}': {} semantic types, {} categories",
            fingerprint.semantic_types.len(),
            categories.rules.len()
        );
        Ok(Self {
            name: name.to_string(),
            normalizer,
            fingerprint,
            categories,
        })
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRuleSet {
    schema_version: Option<u32>,
    normalizer: Option<RawNormalizer>,
    fingerprint: Option<RawFingerprintRules>,
    categories: Option<Vec<RawCategoryRule>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNormalizer {
    structural_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFingerprintRules {
    min_confidence: Option<f32>,
    whole_word_bonus: Option<f32>,
    positional_terms: Option<Vec<String>>,
    noise_terms: Option<Vec<String>>,
    semantic_types: Option<Vec<RawSemanticType>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSemanticType {
    name: String,
    keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCategoryRule {
    category: Category,
    patterns: Vec<String>,
}

fn builtin_raw() -> RawRuleSet {
    parse_raw(BUILTIN_RULES.as_bytes()).expect("bundled rules must be valid JSON")
}

fn parse_raw(bytes: &[u8]) -> Result<RawRuleSet> {
    match serde_json::from_slice::<RawRuleSet>(bytes) {
        Ok(raw) => Ok(raw),
        Err(json_err) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|err| SemanticsError::ParseError(format!("{json_err}; {err}")))?;
            toml::from_str::<RawRuleSet>(text).map_err(|toml_err| {
                SemanticsError::ParseError(format!(
                    "not valid JSON ({json_err}) or TOML ({toml_err})"
                ))
            })
        }
    }
}

fn merge_raw(base: RawRuleSet, overlay: RawRuleSet) -> RawRuleSet {
    let fingerprint = match (base.fingerprint, overlay.fingerprint) {
        (Some(base), Some(over)) => Some(RawFingerprintRules {
            min_confidence: over.min_confidence.or(base.min_confidence),
            whole_word_bonus: over.whole_word_bonus.or(base.whole_word_bonus),
            positional_terms: over.positional_terms.or(base.positional_terms),
            noise_terms: over.noise_terms.or(base.noise_terms),
            semantic_types: over.semantic_types.or(base.semantic_types),
        }),
        (base, over) => over.or(base),
    };

    let categories = match (base.categories, overlay.categories) {
        (Some(mut base), Some(over)) => {
            for rule in over {
                match base.iter_mut().find(|b| b.category == rule.category) {
                    Some(existing) => existing.patterns = rule.patterns,
                    None => base.push(rule),
                }
            }
            Some(base)
        }
        (base, over) => over.or(base),
    };

    RawRuleSet {
        schema_version: overlay.schema_version.or(base.schema_version),
        normalizer: overlay.normalizer.or(base.normalizer),
        fingerprint,
        categories,
    }
}

fn lowercase_set(terms: Vec<String>) -> HashSet<String> {
    terms
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
