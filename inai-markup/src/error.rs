use thiserror::Error;

pub type MarkupResult<T> = Result<T, MarkupError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkupError {
    #[error("Maximum nesting depth ({max_depth}) exceeded")]
    MaxNestingDepthExceeded { max_depth: usize },

    #[error("Path [{path}] does not resolve: no element child at index {index} (depth {depth})")]
    PathNotFound {
        path: String,
        depth: usize,
        index: usize,
    },

    #[error("Path is empty: the root container is not an element")]
    EmptyPath,

    #[error("Path [{path}] points at a <{tag}> the browser inserted; it has no markup to edit")]
    ImpliedElement { path: String, tag: String },

    #[error("Invalid path '{input}': {reason}")]
    InvalidPath { input: String, reason: String },

    #[error("Invalid style property '{property}': {reason}")]
    InvalidStyle { property: String, reason: String },

    #[error("Unknown preset '{name}'")]
    UnknownPreset { name: String },

    #[error("Attribute '{name}' cannot be set by an element edit")]
    UnsafeAttribute { name: String },

    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),
}

impl From<serde_json::Error> for MarkupError {
    fn from(err: serde_json::Error) -> Self {
        MarkupError::InvalidMutation(err.to_string())
    }
}
