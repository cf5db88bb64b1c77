use regex::Regex;

use crate::{Result, SemanticsError};

/// Default structural prefix: `<container>[<index>].<container><index>[<index>].`,
/// e.g. `topmostSubform[0].Page1[0].` as emitted by XFA-converted forms.
pub const DEFAULT_STRUCTURAL_PREFIX: &str = r"^[A-Za-z_]\w*\[\d+\]\.[A-Za-z_]+\d+\[\d+\]\.";

const SIGIL: char = '@';

/// Turns raw form-field identifiers into human-readable display names.
#[derive(Debug, Clone)]
pub struct Normalizer {
    structural_prefix: Regex,
}

impl Normalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix_pattern(DEFAULT_STRUCTURAL_PREFIX)
            .expect("default structural prefix must compile")
    }

    pub fn with_prefix_pattern(pattern: &str) -> Result<Self> {
        let structural_prefix =
            Regex::new(pattern).map_err(|err| SemanticsError::invalid_pattern(pattern, err))?;
        Ok(Self { structural_prefix })
    }

    /// Strip the sigil and structural prefix, turn underscores into spaces and
    /// title-case every token.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let name = raw.strip_prefix(SIGIL).unwrap_or(raw);
        let name = match self.structural_prefix.find(name) {
            Some(prefix) => &name[prefix.end()..],
            None => name,
        };

        name.replace('_', " ")
            .split_whitespace()
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Display name shown to operators; same transformation as [`Self::normalize`].
    #[must_use]
    pub fn display_name(&self, raw: &str) -> String {
        self.normalize(raw)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
