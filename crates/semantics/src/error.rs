use thiserror::Error;

/// Result type for semantic analysis operations
pub type Result<T> = std::result::Result<T, SemanticsError>;

/// Errors raised while loading rules or parsing fingerprints
#[derive(Error, Debug)]
pub enum SemanticsError {
    /// Rule set failed validation
    #[error("Invalid rules: {0}")]
    InvalidRules(String),

    /// A configured regex pattern does not compile
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Rules declare a schema this build does not understand
    #[error("rules.schema_version {0} is not supported (expected 1)")]
    UnsupportedSchema(u32),

    /// Rules are neither JSON nor TOML
    #[error("Rules parse error: {0}")]
    ParseError(String),

    /// A fingerprint string could not be parsed
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SemanticsError {
    /// Create an invalid rules error
    pub fn invalid_rules(msg: impl Into<String>) -> Self {
        Self::InvalidRules(msg.into())
    }

    /// Create an invalid fingerprint error
    pub fn invalid_fingerprint(msg: impl Into<String>) -> Self {
        Self::InvalidFingerprint(msg.into())
    }

    pub(crate) fn invalid_pattern(pattern: &str, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        }
    }
}
