//! # Formfill Document
//!
//! Capabilities for reading fillable fields out of a template and writing
//! values back, plus AcroForm implementations built on `lopdf`.
//!
//! ```text
//! template.pdf ──> DocumentReader ──> Vec<RawField>
//!
//! template.pdf + {field id → value} ──> DocumentWriter ──> output.pdf
//! ```
//!
//! Callers hold readers as an ordered strategy list: [`AcroFormReader`] first,
//! [`FieldListReader`] when the full field tree cannot be walked.

mod acroform;
mod capability;
mod error;

pub use acroform::{field_values, AcroFormReader, AcroFormWriter, FieldListReader};
pub use capability::{DocumentReader, DocumentWriter, RawField};
pub use error::{DocumentError, Result};
