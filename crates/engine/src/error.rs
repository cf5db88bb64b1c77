use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Semantics error: {0}")]
    Semantics(#[from] formfill_semantics::SemanticsError),

    #[error("Document error: {0}")]
    Document(#[from] formfill_document::DocumentError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported template '{}': only .pdf files are accepted", .0.display())]
    UnsupportedTemplate(PathBuf),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Could not copy template to {}: {source}", .output.display())]
    FallbackCopy {
        output: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Randomness unavailable: {0}")]
    Randomness(String),
}
