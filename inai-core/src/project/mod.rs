//! Virtual project: a file tree owned by one [`ProjectStore`] and shared
//! through [`ProjectHandle`].

pub mod node;
pub mod path_util;
pub mod store;

pub use node::{FileNode, Language, NodeKind};
pub use store::{ImportEntry, ProjectHandle, ProjectState, ProjectStore, DEFAULT_MAX_DEPTH};
