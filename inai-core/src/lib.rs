//! # inai-core
//!
//! Host side of the live preview: the virtual project store, streaming
//! ingestion of generated files, edit history and the editor session that
//! connects them to the sandboxed preview.

pub mod config;
pub mod editor;
pub mod error;
pub mod generation;
pub mod history;
pub mod ingest;
pub mod logging;
pub mod project;

pub use config::HostConfig;
pub use editor::{collect_sources, EditorSession, Notice};
pub use error::{InaiError, InaiResult};
pub use generation::{ElementTarget, GenerationClient, GenerationRequest};
pub use history::{EditHistory, HistoryEntry};
pub use ingest::{IngestEnd, IngestOutcome, IngestionAdapter, Progress, RequestTracker, StreamEvent};
pub use logging::init_logging;
pub use project::{FileNode, ImportEntry, Language, NodeKind, ProjectHandle, ProjectState, ProjectStore};
