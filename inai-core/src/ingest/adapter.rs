//! Writes a generation stream into the project store as it arrives.

use std::collections::HashSet;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{pin_mut, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{FileEntry, LineDecoder, Malformed, StreamEvent};
use super::legacy::{normalize_legacy, CanonicalFiles};
use crate::error::{InaiError, InaiResult};
use crate::project::{path_util, Language, ProjectHandle};

pub type RequestId = u64;

/// Identity of the newest generation request. Only the newest may write.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    current: Arc<AtomicU64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a request, superseding any in flight.
    pub fn begin(&self) -> RequestId {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> RequestId {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        self.current() == id
    }
}

/// Progress a UI may display while a stream is consumed.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Status {
        message: String,
        stage: Option<String>,
    },
    /// The whole running code buffer after a chunk was appended.
    Code(String),
    FileWritten {
        path: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestEnd {
    Complete,
    /// The stream ended without `complete`; files written so far are kept.
    Incomplete,
    /// A newer request started; nothing was written after that point.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub end: IngestEnd,
    /// Paths written, in order. A path written twice appears twice.
    pub written: Vec<String>,
    pub skipped: usize,
    pub active_file: Option<Uuid>,
    pub code_buffer: String,
}

enum Flow {
    Continue,
    Done,
    Superseded,
}

pub struct IngestionAdapter {
    project: ProjectHandle,
    tracker: RequestTracker,
    line_prefix: String,
    progress: Option<mpsc::UnboundedSender<Progress>>,
}

struct Run {
    request: RequestId,
    written: Vec<String>,
    streamed: HashSet<String>,
    skipped: usize,
    code_buffer: String,
    main_entry: Option<String>,
}

impl IngestionAdapter {
    pub fn new(project: ProjectHandle, tracker: RequestTracker) -> Self {
        Self {
            project,
            tracker,
            line_prefix: "data: ".to_string(),
            progress: None,
        }
    }

    pub fn with_line_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.line_prefix = prefix.into();
        self
    }

    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<Progress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Consumes a chunked byte stream for `request`.
    ///
    /// A stream `error` event or a transport failure returns
    /// [`InaiError::Stream`]; files committed before it are kept.
    pub async fn ingest<S, B, E>(&self, request: RequestId, stream: S) -> InaiResult<IngestOutcome>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut decoder = LineDecoder::new(self.line_prefix.clone());
        let mut run = Run::new(request);
        pin_mut!(stream);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| InaiError::Stream(format!("transport failed: {}", e)))?;
            for decoded in decoder.push(chunk.as_ref()) {
                match self.handle(&mut run, decoded)? {
                    Flow::Continue => {}
                    Flow::Done => return Ok(self.finish(run, IngestEnd::Complete)),
                    Flow::Superseded => return Ok(self.superseded(run)),
                }
            }
        }
        for decoded in decoder.finish() {
            match self.handle(&mut run, decoded)? {
                Flow::Continue => {}
                Flow::Done => return Ok(self.finish(run, IngestEnd::Complete)),
                Flow::Superseded => return Ok(self.superseded(run)),
            }
        }
        if !self.tracker.is_current(request) {
            return Ok(self.superseded(run));
        }
        warn!(request, files = run.written.len(), "stream ended without completion");
        Ok(self.finish(run, IngestEnd::Incomplete))
    }

    /// Consumes already decoded events; same semantics as [`Self::ingest`].
    pub async fn ingest_events<S>(&self, request: RequestId, events: S) -> InaiResult<IngestOutcome>
    where
        S: Stream<Item = StreamEvent>,
    {
        let mut run = Run::new(request);
        pin_mut!(events);
        while let Some(event) = events.next().await {
            match self.handle(&mut run, Ok(event))? {
                Flow::Continue => {}
                Flow::Done => return Ok(self.finish(run, IngestEnd::Complete)),
                Flow::Superseded => return Ok(self.superseded(run)),
            }
        }
        if !self.tracker.is_current(request) {
            return Ok(self.superseded(run));
        }
        Ok(self.finish(run, IngestEnd::Incomplete))
    }

    fn handle(&self, run: &mut Run, decoded: Result<StreamEvent, Malformed>) -> InaiResult<Flow> {
        if !self.tracker.is_current(run.request) {
            return Ok(Flow::Superseded);
        }
        let event = match decoded {
            Ok(event) => event,
            Err(bad) => {
                warn!(reason = %bad.reason, line = %bad.line, "skipping malformed stream line");
                run.skipped += 1;
                return Ok(Flow::Continue);
            }
        };

        match event {
            StreamEvent::Status { message, stage } => {
                debug!(%message, "generation status");
                self.report(Progress::Status { message, stage });
            }
            StreamEvent::CodeChunk { chunk } => {
                run.code_buffer.push_str(&chunk);
                self.report(Progress::Code(run.code_buffer.clone()));
            }
            StreamEvent::File(entry) => self.write_entry(run, &entry),
            StreamEvent::Complete {
                response,
                is_multi_file,
            } => {
                if is_multi_file {
                    self.complete_multi_file(run, &response);
                } else {
                    self.complete_legacy(run, &response);
                }
                return Ok(Flow::Done);
            }
            StreamEvent::Error { error } => {
                warn!(request = run.request, %error, "generation stream failed");
                return Err(InaiError::Stream(error));
            }
        }
        Ok(Flow::Continue)
    }

    fn write_entry(&self, run: &mut Run, entry: &FileEntry) {
        let language = entry
            .file_type
            .as_deref()
            .and_then(|t| t.parse::<Language>().ok());
        match self
            .project
            .update(|store| store.upsert_file_by_path(&entry.name, &entry.content, language))
        {
            Ok(node) => {
                debug!(path = %node.path, bytes = entry.content.len(), "file committed");
                run.streamed.insert(node.path.clone());
                run.written.push(node.path.clone());
                self.report(Progress::FileWritten { path: node.path });
            }
            Err(e) => {
                warn!(name = %entry.name, error = %e, "skipping file entry");
                run.skipped += 1;
            }
        }
    }

    fn complete_multi_file(&self, run: &mut Run, response: &Value) {
        run.main_entry = response
            .get("mainEntry")
            .and_then(Value::as_str)
            .and_then(|p| path_util::normalize(p).ok());
        let Some(files) = response.get("files").and_then(Value::as_array) else {
            return;
        };
        for file in files {
            let entry = match StreamEvent::from_value(&serde_json::json!({"type": "file", "file": file})) {
                Ok(Some(StreamEvent::File(entry))) => entry,
                _ => {
                    warn!("skipping malformed entry in files[]");
                    run.skipped += 1;
                    continue;
                }
            };
            let already = path_util::normalize(&entry.name)
                .map(|p| run.streamed.contains(&p))
                .unwrap_or(false);
            if !already {
                self.write_entry(run, &entry);
            }
        }
    }

    fn complete_legacy(&self, run: &mut Run, response: &Value) {
        let Some(files) = normalize_legacy(response) else {
            warn!("complete event carried no pages or html");
            return;
        };
        self.write_canonical(run, &files);
    }

    fn write_canonical(&self, run: &mut Run, files: &CanonicalFiles) {
        for (name, content) in files.entries() {
            self.write_entry(
                run,
                &FileEntry {
                    name: name.to_string(),
                    content: content.to_string(),
                    file_type: None,
                },
            );
        }
    }

    fn superseded(&self, run: Run) -> IngestOutcome {
        info!(request = run.request, written = run.written.len(), "ingestion superseded");
        IngestOutcome {
            end: IngestEnd::Superseded,
            written: run.written,
            skipped: run.skipped,
            active_file: None,
            code_buffer: run.code_buffer,
        }
    }

    /// Activates the main entry (else the HTML entry point) when anything was written.
    fn finish(&self, run: Run, end: IngestEnd) -> IngestOutcome {
        let active_file = if run.written.is_empty() {
            None
        } else {
            self.project.update(|store| {
                let id = run
                    .main_entry
                    .as_deref()
                    .and_then(|p| store.find_by_path(p))
                    .filter(|n| n.is_file())
                    .or_else(|| store.html_entry())
                    .map(|n| n.id)?;
                store.set_active_file(id).ok().map(|_| id)
            })
        };
        info!(
            request = run.request,
            files = run.written.len(),
            skipped = run.skipped,
            ?end,
            "ingestion finished"
        );
        IngestOutcome {
            end,
            written: run.written,
            skipped: run.skipped,
            active_file,
            code_buffer: run.code_buffer,
        }
    }

    fn report(&self, progress: Progress) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(progress);
        }
    }
}

impl Run {
    fn new(request: RequestId) -> Self {
        Self {
            request,
            written: Vec::new(),
            streamed: HashSet::new(),
            skipped: 0,
            code_buffer: String::new(),
            main_entry: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_supersedes() {
        let tracker = RequestTracker::new();
        let first = tracker.begin();
        assert!(tracker.is_current(first));
        let second = tracker.clone().begin();
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
    }

    #[tokio::test]
    async fn test_error_event_keeps_committed_files() {
        let project = ProjectHandle::default();
        let adapter = IngestionAdapter::new(project.clone(), RequestTracker::new());
        let request = adapter.tracker().begin();
        let events = futures::stream::iter(vec![
            StreamEvent::File(FileEntry {
                name: "index.html".into(),
                content: "<p>x</p>".into(),
                file_type: Some("html".into()),
            }),
            StreamEvent::Error {
                error: "quota".into(),
            },
        ]);
        let err = adapter.ingest_events(request, events).await.unwrap_err();
        assert!(matches!(err, InaiError::Stream(ref m) if m == "quota"));
        assert_eq!(project.content_at("index.html").as_deref(), Some("<p>x</p>"));
    }

    #[tokio::test]
    async fn test_progress_reports_running_buffer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let adapter =
            IngestionAdapter::new(ProjectHandle::default(), RequestTracker::new()).with_progress(tx);
        let request = adapter.tracker().begin();
        let events = futures::stream::iter(vec![
            StreamEvent::CodeChunk { chunk: "<h1>".into() },
            StreamEvent::CodeChunk { chunk: "Hi".into() },
        ]);
        let outcome = adapter.ingest_events(request, events).await.unwrap();
        assert_eq!(outcome.end, IngestEnd::Incomplete);
        assert_eq!(outcome.code_buffer, "<h1>Hi");
        assert_eq!(rx.recv().await, Some(Progress::Code("<h1>".into())));
        assert_eq!(rx.recv().await, Some(Progress::Code("<h1>Hi".into())));
    }
}
