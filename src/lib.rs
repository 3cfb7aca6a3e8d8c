//! # pdf_flatten
//!
//! Flattens a PDF's interactive form layer into static page content: every
//! fillable widget (text field, checkbox, button) is redrawn as permanent
//! graphics on its page, then the AcroForm layer is deleted so the document
//! is no longer editable. Intended for pipelines that must render forms as
//! fixed content, e.g. for archival or print.
//!
//! The heavy lifting of parsing and serializing PDF bytes is delegated to
//! [`lopdf`]; this crate owns everything in between: appearance resolution,
//! placement transforms, content-stream synthesis, field-tree inheritance,
//! and on-demand appearance generation for documents that set
//! `NeedAppearances`.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_flatten::{flatten_file, FlattenOptions};
//!
//! # fn main() -> pdf_flatten::Result<()> {
//! let summary = flatten_file("form.pdf", "flattened.pdf", &FlattenOptions::default())?;
//! println!("flattened {} widgets", summary.flattened);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Per-annotation checks and geometry
pub mod annotation;
pub mod geometry;
pub mod transform;

// Appearance handling
pub mod appearance;
pub mod fields;
pub mod generate;

// Page rewriting
pub mod flatten;
pub mod overlay;

// Object graph helpers
pub(crate) mod graph;

// Re-exports
pub use annotation::AnnotationFlags;
pub use error::{Error, Result};
pub use flatten::{flatten_document, flatten_file, FlattenOptions, FlattenSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
