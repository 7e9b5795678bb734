//! # inai-markup
//!
//! Addressable HTML for surgical edits of generated pages.
//!
//! - Lenient parser that never rejects malformed markup (only excessive nesting)
//! - Byte-preserving serializer: untouched regions come back exactly as written
//! - Structural paths (`[0, 2, 1]`) counted over element children of `<body>`
//! - Element mutations (text, classes, inline style, alignment, presets, attributes)
//!
//! ## Example
//! ```
//! use inai_markup::{apply_mutation, ElementMutation, ElementPath};
//!
//! let html = "<div><h1>Hi</h1><p>Lo</p></div>";
//! let path: ElementPath = "0.0".parse().unwrap();
//! let out = apply_mutation(html, &path, &ElementMutation::Text { value: "Hello".into() });
//! assert_eq!(out, "<div><h1>Hello</h1><p>Lo</p></div>");
//! ```

pub mod document;
pub mod error;
pub mod escape;
pub mod mutation;
pub mod parser;
pub mod path;
pub mod preset;
pub mod style;

pub use document::{scrub_class_names, Element, Fragment, Node, BOOKKEEPING_CLASSES};
pub use error::{MarkupError, MarkupResult};
pub use mutation::{
    apply_mutation, inspect, mutate, try_apply_mutation, try_mutate, Alignment, ElementMutation,
    ElementSnapshot,
};
pub use parser::{parse_fragment, MAX_NESTING_DEPTH};
pub use path::ElementPath;
pub use preset::{Preset, HOVER_SCALE_CLASS};
pub use style::StyleDeclarations;
