use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Document has no interactive form")]
    NoAcroForm,

    #[error("Malformed field tree: {0}")]
    MalformedFieldTree(String),

    #[error("{0}")]
    Other(String),
}
