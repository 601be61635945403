#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

/// Error types for this crate.
mod error;
pub use error::*;

/// EBML variable-length integer decoding.
mod vint;

/// The byte source: a seekable, buffered reader over the input.
mod source;

/// Typed value decoding for leaf elements.
mod value;

/// The element schema/DTD: ID table and per-container legal-children sets.
mod schema;

/// The element tree: arena, node type, and cooked-value overlay.
pub mod element;

/// Semantic post-processing ("cooking") of well-known fields.
mod cook;

/// The selective-read controller: SeekHead, tail scan, exhaustive fallback.
mod seek;

/// Root finder / resync.
mod root;

/// The element reader: the traversal all the other modules assemble around.
mod reader;

/// Parse configuration.
pub mod options;

/// The parsed document and its top-level `parse` entry point.
pub mod document;

pub use document::{parse, Document};
pub use options::{Action, Options};

/// A prelude for common types and traits.
pub mod prelude {
    pub use crate::document::{parse, Document};
    pub use crate::element::{Cooked, Element, NodeId, Value};
    pub use crate::error::{Error, Result};
    pub use crate::options::{Action, Options};
}
