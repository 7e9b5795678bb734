use inai_markup::{ElementPath, MarkupError};
use inai_preview::PreviewError;
use thiserror::Error;
use uuid::Uuid;

pub type InaiResult<T> = Result<T, InaiError>;

#[derive(Error, Debug)]
pub enum InaiError {
    #[error("Node {id} not found")]
    NotFound { id: Uuid },

    #[error("Invalid parent: {reason}")]
    InvalidParent { reason: String },

    #[error("Maximum tree depth ({max_depth}) exceeded")]
    DepthLimitExceeded { max_depth: usize },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Edit did not apply at [{path}]: {source}")]
    PathResolution {
        path: ElementPath,
        #[source]
        source: MarkupError,
    },

    #[error("No element is selected")]
    NoSelection,

    #[error("No page is being previewed")]
    NoPage,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preview error: {0}")]
    Preview(#[from] PreviewError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl InaiError {
    pub(crate) fn invalid_parent(reason: impl Into<String>) -> Self {
        InaiError::InvalidParent {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        InaiError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_yaml::Error> for InaiError {
    fn from(err: serde_yaml::Error) -> Self {
        InaiError::Config(err.to_string())
    }
}
