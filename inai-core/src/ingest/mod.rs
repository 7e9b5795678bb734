//! Streaming ingestion of generated output into the project store.

pub mod adapter;
pub mod events;
pub mod legacy;

pub use adapter::{IngestEnd, IngestOutcome, IngestionAdapter, Progress, RequestId, RequestTracker};
pub use events::{FileEntry, LineDecoder, Malformed, StreamEvent};
pub use legacy::{normalize_legacy, unwrap_body, CanonicalFiles, INDEX_HTML, SCRIPT_JS, STYLES_CSS};
