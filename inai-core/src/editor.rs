//! Editor session: the host side that ties the store, the preview and the
//! edit history together.
//!
//! One session previews one HTML page at a time. Selections arrive from the
//! sandbox through the [`HostChannel`], edits go through the markup mutator
//! into the store, get recorded in the [`EditHistory`] and are re-rendered
//! through the [`RenderScheduler`].

use inai_markup::{inspect, try_apply_mutation, ElementMutation, ElementPath};
use inai_preview::{
    assemble, ExportBundle, HostChannel, PreviewSources, Received, RenderScheduler, Selection,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::HostConfig;
use crate::error::{InaiError, InaiResult};
use crate::generation::{ElementTarget, GenerationRequest};
use crate::history::EditHistory;
use crate::ingest::{RequestId, RequestTracker};
use crate::project::{path_util, FileNode, Language, ProjectHandle, ProjectStore};

const NOTICE_CAPACITY: usize = 64;

/// Host-visible events a UI can surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Selected(Selection),
    SelectionCleared,
    /// An element edit was requested without a selection.
    NoSelection,
    /// The selected path no longer resolves; the page was left unchanged.
    EditNotApplied { path: ElementPath, reason: String },
    PageChanged { path: String },
    NavigationFailed { target: String, reason: String },
    Resized(f64),
}

/// Page markup plus every stylesheet and script of the project, in tree order.
pub fn collect_sources(store: &ProjectStore, page: &FileNode) -> PreviewSources {
    let files = store.files();
    let joined = |language: Language| {
        files
            .iter()
            .filter(|f| f.language() == Some(language))
            .filter_map(|f| f.content())
            .collect::<Vec<_>>()
            .join("\n")
    };
    PreviewSources::new(
        page.content().unwrap_or_default(),
        joined(Language::Css),
        joined(Language::Javascript),
    )
}

/// Active file when it is HTML, else the project's HTML entry point.
fn current_page(store: &ProjectStore) -> Option<&FileNode> {
    store
        .state()
        .active_file()
        .filter(|f| f.language() == Some(Language::Html))
        .or_else(|| store.html_entry())
}

pub struct EditorSession {
    project: ProjectHandle,
    scheduler: RenderScheduler,
    channel: HostChannel,
    tracker: RequestTracker,
    history: EditHistory,
    page: Option<Uuid>,
    selection: Option<Selection>,
    notices: broadcast::Sender<Notice>,
}

impl EditorSession {
    pub fn new(
        project: ProjectHandle,
        scheduler: RenderScheduler,
        tracker: RequestTracker,
        config: &HostConfig,
    ) -> Self {
        let channel = HostChannel::new(scheduler.tokens(), config.render.resize_clamp());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            project,
            scheduler,
            channel,
            tracker,
            history: EditHistory::new(config.history.max_entries),
            page: None,
            selection: None,
            notices,
        }
    }

    pub fn project(&self) -> &ProjectHandle {
        &self.project
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub fn channel(&self) -> &HostChannel {
        &self.channel
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Project path of the page being previewed.
    pub fn page_path(&self) -> Option<String> {
        let id = self.page?;
        self.project.read(|s| s.get(id).ok().map(|n| n.path.clone()))
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    /// Re-reads the store and schedules a render of the current page.
    ///
    /// Switching pages starts a fresh history. Content that changed outside
    /// this session (a regeneration) is recorded as a new history entry.
    pub fn refresh(&mut self) -> InaiResult<()> {
        let Some((id, path, sources)) = self.project.read(|store| {
            current_page(store).map(|page| (page.id, page.path.clone(), collect_sources(store, page)))
        }) else {
            debug!("no html page to preview");
            return Ok(());
        };

        if self.page != Some(id) {
            info!(%path, "previewing page");
            self.page = Some(id);
            self.history.reset(sources.html.clone());
            self.clear_selection();
            self.notify(Notice::PageChanged { path });
        } else if self.history.current() != Some(sources.html.as_str()) {
            self.history.push(sources.html.clone(), "regenerate");
        }
        self.scheduler.schedule(assemble(&sources))?;
        Ok(())
    }

    pub fn set_select_mode(&mut self, enabled: bool) -> InaiResult<()> {
        let message = self.channel.set_select_mode(enabled);
        self.scheduler.post(message)?;
        if !enabled {
            self.clear_selection();
        }
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.selection.take().is_some() {
            self.notify(Notice::SelectionCleared);
        }
    }

    /// Routes one raw envelope from the sandbox. Malformed or stale input is
    /// ignored and navigation failures become notices; only a closed
    /// scheduler is an error.
    pub fn handle_sandbox_message(&mut self, raw: &str) -> InaiResult<Received> {
        let received = self.channel.receive_raw(raw);
        match &received {
            Received::Ignored => {}
            Received::Reply(message) => self.scheduler.post(*message)?,
            Received::Selected(selection) => {
                debug!(path = %selection.path, tag = %selection.tag_name, "element selected");
                self.selection = Some(selection.clone());
                self.notify(Notice::Selected(selection.clone()));
            }
            Received::Navigate(target) => {
                if let Err(e) = self.navigate(target) {
                    warn!(%target, error = %e, "navigation failed");
                }
            }
            Received::Resized(height) => self.notify(Notice::Resized(*height)),
        }
        Ok(received)
    }

    /// Applies `mutation` to the selected element of the current page.
    pub fn apply_mutation(&mut self, mutation: &ElementMutation) -> InaiResult<()> {
        let Some(selection) = self.selection.clone() else {
            self.notify(Notice::NoSelection);
            return Err(InaiError::NoSelection);
        };
        let (page, markup) = self.page_content()?;

        let updated = match try_apply_mutation(&markup, &selection.path, mutation) {
            Ok(updated) => updated,
            Err(source) => {
                warn!(path = %selection.path, error = %source, "edit did not apply");
                self.notify(Notice::EditNotApplied {
                    path: selection.path.clone(),
                    reason: source.to_string(),
                });
                return Err(InaiError::PathResolution {
                    path: selection.path,
                    source,
                });
            }
        };
        if updated == markup {
            return Ok(());
        }

        self.project.update(|s| s.update_file(page, &updated))?;
        self.history.push(updated.clone(), mutation.label());
        if let Ok(snapshot) = inspect(&updated, &selection.path) {
            self.selection = Some(Selection {
                path: selection.path,
                tag_name: snapshot.tag_name,
                text_content: snapshot.text_content,
                class_names: snapshot.class_names,
            });
        }
        self.refresh()
    }

    /// Steps back one entry; `false` when already at the first.
    pub fn undo(&mut self) -> InaiResult<bool> {
        match self.history.undo().map(str::to_string) {
            Some(snapshot) => self.restore(&snapshot).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> InaiResult<bool> {
        match self.history.redo().map(str::to_string) {
            Some(snapshot) => self.restore(&snapshot).map(|_| true),
            None => Ok(false),
        }
    }

    fn restore(&mut self, snapshot: &str) -> InaiResult<()> {
        let (page, _) = self.page_content()?;
        self.project.update(|s| s.update_file(page, snapshot))?;
        self.refresh()
    }

    fn page_content(&self) -> InaiResult<(Uuid, String)> {
        let id = self.page.ok_or(InaiError::NoPage)?;
        self.project.read(|s| {
            let node = s.get(id)?;
            Ok((id, node.content().unwrap_or_default().to_string()))
        })
    }

    /// Opens the project file a link in the current page points at.
    pub fn navigate(&mut self, target: &str) -> InaiResult<()> {
        let from = self.page_path().unwrap_or_default();
        let resolved = match path_util::resolve_relative(&from, target) {
            Ok(p) => p,
            Err(e) => {
                self.notify(Notice::NavigationFailed {
                    target: target.to_string(),
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };
        let found = self
            .project
            .read(|s| s.find_by_path(&resolved).filter(|n| n.is_file()).map(|n| n.id));
        let Some(id) = found else {
            self.notify(Notice::NavigationFailed {
                target: target.to_string(),
                reason: format!("no file at '{}'", resolved),
            });
            return Err(InaiError::invalid_path(&resolved, "no such file in the project"));
        };
        self.project.update(|s| s.set_active_file(id))?;
        self.refresh()
    }

    /// Starts a new generation, superseding any stream still being ingested.
    pub fn begin_generation(&mut self) -> RequestId {
        self.clear_selection();
        self.tracker.begin()
    }

    /// A request scoped to the selected element of the current page.
    pub fn element_request(&mut self, prompt: &str) -> InaiResult<GenerationRequest> {
        let Some(selection) = self.selection.as_ref() else {
            self.notify(Notice::NoSelection);
            return Err(InaiError::NoSelection);
        };
        let target = ElementTarget::from(selection);
        let (_, content) = self.page_content()?;
        let file_name = self.page_path().unwrap_or_default();
        Ok(GenerationRequest::for_element(prompt, target, file_name, content))
    }

    /// Downloadable bundle of the current page with the project's styles and scripts.
    pub fn export(&self) -> Option<ExportBundle> {
        self.project.read(|store| {
            current_page(store).map(|page| ExportBundle::from_sources(&collect_sources(store, page)))
        })
    }

    /// Loads any pending render now.
    pub async fn flush(&self) -> InaiResult<()> {
        self.scheduler.flush().await?;
        Ok(())
    }

    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
    }
}
