//! In-memory project tree with snapshot broadcasting.
//!
//! Every successful mutation publishes an immutable [`ProjectState`] snapshot
//! on a broadcast channel. Slow subscribers lag and lose old snapshots; the
//! caller is never blocked.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::node::{FileNode, Language, NodeKind};
use super::path_util;
use crate::error::{InaiError, InaiResult};

pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Snapshots buffered per subscriber before it starts lagging.
const SNAPSHOT_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    pub root: FileNode,
    pub active_file_id: Option<Uuid>,
    pub open_files: Vec<Uuid>,
}

impl ProjectState {
    fn empty() -> Self {
        Self {
            root: FileNode::root(),
            active_file_id: None,
            open_files: Vec::new(),
        }
    }

    pub fn active_file(&self) -> Option<&FileNode> {
        self.active_file_id.and_then(|id| self.root.find(id))
    }
}

/// One entry of a bulk import: a project path, its content and an optional type hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEntry {
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl ImportEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            file_type: None,
        }
    }
}

pub struct ProjectStore {
    state: ProjectState,
    max_depth: usize,
    events: broadcast::Sender<Arc<ProjectState>>,
}

impl Default for ProjectStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl ProjectStore {
    pub fn new(max_depth: usize) -> Self {
        let (events, _) = broadcast::channel(SNAPSHOT_CAPACITY);
        Self {
            state: ProjectState::empty(),
            max_depth: max_depth.max(1),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProjectState>> {
        self.events.subscribe()
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    pub fn snapshot(&self) -> Arc<ProjectState> {
        Arc::new(self.state.clone())
    }

    pub fn root_id(&self) -> Uuid {
        self.state.root.id
    }

    pub fn get(&self, id: Uuid) -> InaiResult<&FileNode> {
        self.state.root.find(id).ok_or(InaiError::NotFound { id })
    }

    pub fn find_by_path(&self, path: &str) -> Option<&FileNode> {
        let path = path_util::normalize(path).ok()?;
        self.state.root.find_by_path(&path)
    }

    /// All files in tree order.
    pub fn files(&self) -> Vec<&FileNode> {
        let mut out = Vec::new();
        self.state.root.collect_files(&mut out);
        out
    }

    /// `index.html` at the root, else the first HTML file in tree order.
    pub fn html_entry(&self) -> Option<&FileNode> {
        self.state
            .root
            .find_by_path("index.html")
            .filter(|n| n.is_file())
            .or_else(|| {
                self.files()
                    .into_iter()
                    .find(|f| f.language() == Some(Language::Html))
            })
    }

    fn publish(&self) {
        // No receivers is fine.
        let _ = self.events.send(self.snapshot());
    }

    /// Folder to create into; `None` means the root.
    fn creation_parent(&mut self, parent_id: Option<Uuid>) -> InaiResult<&mut FileNode> {
        let id = parent_id.unwrap_or(self.state.root.id);
        let depth = self
            .state
            .root
            .depth_of(id)
            .ok_or(InaiError::NotFound { id })?;
        if depth + 1 > self.max_depth {
            return Err(InaiError::DepthLimitExceeded {
                max_depth: self.max_depth,
            });
        }
        let parent = self
            .state
            .root
            .find_mut(id)
            .ok_or(InaiError::NotFound { id })?;
        if !parent.is_folder() {
            return Err(InaiError::invalid_parent(format!(
                "cannot create inside file '{}'",
                parent.path
            )));
        }
        Ok(parent)
    }

    fn push_child(&mut self, parent_id: Option<Uuid>, make: impl FnOnce(&str) -> FileNode) -> InaiResult<FileNode> {
        let parent = self.creation_parent(parent_id)?;
        let node = make(&parent.path);
        if let Some(children) = parent.children_mut() {
            children.push(node.clone());
        }
        self.publish();
        Ok(node)
    }

    /// Same-name siblings are accepted; lookups by path return the first.
    pub fn create_file(
        &mut self,
        parent_id: Option<Uuid>,
        name: &str,
        content: &str,
        language: Option<Language>,
    ) -> InaiResult<FileNode> {
        path_util::validate_name(name)?;
        self.push_child(parent_id, |parent_path| {
            let path = path_util::join(parent_path, name);
            let language = language.unwrap_or_else(|| Language::from_path(&path));
            FileNode::file(name, path, content.to_string(), language)
        })
    }

    pub fn create_folder(&mut self, parent_id: Option<Uuid>, name: &str) -> InaiResult<FileNode> {
        path_util::validate_name(name)?;
        self.push_child(parent_id, |parent_path| {
            FileNode::folder(name, path_util::join(parent_path, name))
        })
    }

    pub fn delete_file(&mut self, id: Uuid) -> InaiResult<()> {
        if !self.get(id)?.is_file() {
            return Err(InaiError::invalid_parent("deleteFile on a folder"));
        }
        self.remove_node(id)
    }

    /// Removes the folder and evicts every descendant file from the open set.
    pub fn delete_folder(&mut self, id: Uuid) -> InaiResult<()> {
        if id == self.state.root.id {
            return Err(InaiError::invalid_parent("cannot delete the project root"));
        }
        if !self.get(id)?.is_folder() {
            return Err(InaiError::invalid_parent("deleteFolder on a file"));
        }
        self.remove_node(id)
    }

    fn remove_node(&mut self, id: Uuid) -> InaiResult<()> {
        let removed = self
            .state
            .root
            .remove_descendant(id)
            .ok_or(InaiError::NotFound { id })?;
        let mut evicted = Vec::new();
        removed.collect_file_ids(&mut evicted);
        for file_id in evicted {
            self.evict(file_id);
        }
        debug!(path = %removed.path, "removed node");
        self.publish();
        Ok(())
    }

    /// Drops `id` from the open set; if it was active the previous open file
    /// (else the first remaining, else none) becomes active.
    fn evict(&mut self, id: Uuid) {
        let Some(pos) = self.state.open_files.iter().position(|f| *f == id) else {
            if self.state.active_file_id == Some(id) {
                self.state.active_file_id = None;
            }
            return;
        };
        self.state.open_files.remove(pos);
        if self.state.active_file_id == Some(id) {
            self.state.active_file_id = self
                .state
                .open_files
                .get(pos.saturating_sub(1))
                .copied();
        }
    }

    fn file_mut(&mut self, id: Uuid) -> InaiResult<&mut FileNode> {
        let node = self
            .state
            .root
            .find_mut(id)
            .ok_or(InaiError::NotFound { id })?;
        if !node.is_file() {
            return Err(InaiError::invalid_parent(format!(
                "'{}' is a folder",
                node.path
            )));
        }
        Ok(node)
    }

    pub fn update_file(&mut self, id: Uuid, new_content: &str) -> InaiResult<()> {
        let node = self.file_mut(id)?;
        if let NodeKind::File { content, .. } = &mut node.kind {
            *content = new_content.to_string();
        }
        self.publish();
        Ok(())
    }

    /// Renames a file or folder; paths below a folder are recomputed.
    pub fn rename_file(&mut self, id: Uuid, new_name: &str) -> InaiResult<()> {
        path_util::validate_name(new_name)?;
        if id == self.state.root.id {
            return Err(InaiError::invalid_parent("cannot rename the project root"));
        }
        let parent_path = {
            let parent = self
                .state
                .root
                .parent_of(id)
                .ok_or(InaiError::NotFound { id })?;
            self.get(parent)?.path.clone()
        };
        let node = self
            .state
            .root
            .find_mut(id)
            .ok_or(InaiError::NotFound { id })?;
        node.name = new_name.to_string();
        node.repath(&parent_path);
        self.publish();
        Ok(())
    }

    pub fn set_active_file(&mut self, id: Uuid) -> InaiResult<()> {
        self.file_mut(id)?;
        if !self.state.open_files.contains(&id) {
            self.state.open_files.push(id);
        }
        self.state.active_file_id = Some(id);
        self.publish();
        Ok(())
    }

    pub fn close_file(&mut self, id: Uuid) -> InaiResult<()> {
        if !self.get(id)?.is_file() {
            return Err(InaiError::invalid_parent("closeFile on a folder"));
        }
        self.evict(id);
        self.publish();
        Ok(())
    }

    pub fn toggle_folder(&mut self, id: Uuid) -> InaiResult<bool> {
        let node = self
            .state
            .root
            .find_mut(id)
            .ok_or(InaiError::NotFound { id })?;
        let NodeKind::Folder { expanded, .. } = &mut node.kind else {
            return Err(InaiError::invalid_parent("toggleFolder on a file"));
        };
        *expanded = !*expanded;
        let now = *expanded;
        self.publish();
        Ok(now)
    }

    /// Replaces the whole tree with `entries`, creating intermediate folders.
    /// Nothing changes if any entry is invalid. Publishes one snapshot.
    pub fn import_project_structure(&mut self, entries: &[ImportEntry]) -> InaiResult<()> {
        let mut root = FileNode::root();
        for entry in entries {
            let path = path_util::normalize(&entry.path)?;
            let language = Language::detect(entry.file_type.as_deref(), &path);
            upsert_into(&mut root, &path, &entry.content, language, self.max_depth)?;
        }
        self.state = ProjectState {
            root,
            active_file_id: None,
            open_files: Vec::new(),
        };
        debug!(files = entries.len(), "imported project structure");
        self.publish();
        Ok(())
    }

    /// Updates the first file at `path` or creates it with any missing folders.
    /// On error the tree is left as it was.
    pub fn upsert_file_by_path(
        &mut self,
        path: &str,
        content: &str,
        language: Option<Language>,
    ) -> InaiResult<FileNode> {
        let path = path_util::normalize(path)?;
        let language = language.unwrap_or_else(|| Language::from_path(&path));
        let mut root = self.state.root.clone();
        let id = upsert_into(&mut root, &path, content, language, self.max_depth)?;
        self.state.root = root;
        self.publish();
        Ok(self.get(id)?.clone())
    }
}

/// Writes a file at a normalized `path` below `root`; returns its id.
fn upsert_into(
    root: &mut FileNode,
    path: &str,
    content: &str,
    language: Language,
    max_depth: usize,
) -> InaiResult<Uuid> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() > max_depth {
        return Err(InaiError::DepthLimitExceeded { max_depth });
    }
    if let Some(existing) = root.find_by_path(path) {
        if !existing.is_file() {
            return Err(InaiError::invalid_parent(format!("'{}' is a folder", path)));
        }
        let id = existing.id;
        if let Some(NodeKind::File {
            content: c,
            language: l,
        }) = root.find_mut(id).map(|n| &mut n.kind)
        {
            *c = content.to_string();
            *l = language;
        }
        return Ok(id);
    }

    let (file_name, folders) = match segments.split_last() {
        Some(split) => split,
        None => return Err(InaiError::invalid_path(path, "empty path")),
    };
    let mut parent: &mut FileNode = root;
    for name in folders {
        let next = match parent.child_folder_id(name) {
            Some(id) => id,
            None => {
                if parent.children().iter().any(|c| c.is_file() && c.name == *name) {
                    return Err(InaiError::invalid_parent(format!(
                        "'{}' is a file",
                        path_util::join(&parent.path, name)
                    )));
                }
                let folder = FileNode::folder(name, path_util::join(&parent.path, name));
                let id = folder.id;
                if let Some(children) = parent.children_mut() {
                    children.push(folder);
                }
                id
            }
        };
        parent = match parent.children_mut().and_then(|c| c.iter_mut().find(|n| n.id == next)) {
            Some(node) => node,
            None => return Err(InaiError::NotFound { id: next }),
        };
    }

    let file = FileNode::file(
        file_name,
        path.to_string(),
        content.to_string(),
        language,
    );
    let id = file.id;
    match parent.children_mut() {
        Some(children) => children.push(file),
        None => return Err(InaiError::invalid_parent("cannot create inside a file")),
    }
    Ok(id)
}

/// Cloneable shared handle to one store. The lock is held for a single
/// synchronous operation and never across an await.
#[derive(Clone, Default)]
pub struct ProjectHandle {
    inner: Arc<Mutex<ProjectStore>>,
}

impl ProjectHandle {
    pub fn new(store: ProjectStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProjectStore> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn read<R>(&self, f: impl FnOnce(&ProjectStore) -> R) -> R {
        f(&self.lock())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ProjectStore) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProjectState>> {
        self.lock().subscribe()
    }

    pub fn snapshot(&self) -> Arc<ProjectState> {
        self.lock().snapshot()
    }

    /// Content of the file at `path`, if it exists.
    pub fn content_at(&self, path: &str) -> Option<String> {
        self.read(|s| s.find_by_path(path).and_then(|n| n.content().map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_under_file_is_invalid_parent() {
        let mut store = ProjectStore::default();
        let file = store.create_file(None, "a.txt", "", None).unwrap();
        let err = store.create_file(Some(file.id), "b.txt", "", None).unwrap_err();
        assert!(matches!(err, InaiError::InvalidParent { .. }));
        assert_eq!(store.files().len(), 1);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let mut store = ProjectStore::default();
        let id = Uuid::new_v4();
        assert!(matches!(store.update_file(id, "x"), Err(InaiError::NotFound { .. })));
        assert!(matches!(store.close_file(id), Err(InaiError::NotFound { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let mut store = ProjectStore::new(2);
        let a = store.create_folder(None, "a").unwrap();
        let b = store.create_folder(Some(a.id), "b").unwrap();
        let err = store.create_file(Some(b.id), "c.css", "", None).unwrap_err();
        assert!(matches!(err, InaiError::DepthLimitExceeded { max_depth: 2 }));
        assert!(store.upsert_file_by_path("x/y/z.css", "", None).is_err());
        assert!(store.find_by_path("x").is_none());
    }

    #[test]
    fn test_close_active_picks_previous() {
        let mut store = ProjectStore::default();
        let ids: Vec<Uuid> = ["a.html", "b.html", "c.html"]
            .iter()
            .map(|n| store.create_file(None, n, "", None).unwrap().id)
            .collect();
        for id in &ids {
            store.set_active_file(*id).unwrap();
        }
        store.set_active_file(ids[1]).unwrap();
        store.close_file(ids[1]).unwrap();
        assert_eq!(store.state().active_file_id, Some(ids[0]));
        store.close_file(ids[0]).unwrap();
        assert_eq!(store.state().active_file_id, Some(ids[2]));
        store.close_file(ids[2]).unwrap();
        assert_eq!(store.state().active_file_id, None);
    }

    #[test]
    fn test_same_name_siblings_are_both_kept() {
        let mut store = ProjectStore::default();
        let first = store.create_file(None, "index.html", "one", None).unwrap();
        let second = store.create_file(None, "index.html", "two", None).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.files().len(), 2);
        assert_eq!(store.find_by_path("index.html").unwrap().id, first.id);
    }

    #[test]
    fn test_delete_folder_evicts_nested_open_files() {
        let mut store = ProjectStore::default();
        let top = store.create_file(None, "top.html", "", None).unwrap();
        let site = store.create_folder(None, "site").unwrap();
        let css = store.create_file(Some(site.id), "a.css", "", None).unwrap();
        let pages = store.create_folder(Some(site.id), "pages").unwrap();
        let deep = store.create_file(Some(pages.id), "deep.html", "", None).unwrap();
        assert_eq!(deep.path, "site/pages/deep.html");
        for id in [top.id, css.id, deep.id] {
            store.set_active_file(id).unwrap();
        }

        store.delete_folder(site.id).unwrap();
        assert_eq!(store.state().open_files, vec![top.id]);
        assert_eq!(store.state().active_file_id, Some(top.id));
        assert!(store.find_by_path("site/pages/deep.html").is_none());
        assert_eq!(store.files().len(), 1);
    }

    #[test]
    fn test_delete_folder_with_only_open_file_clears_active() {
        let mut store = ProjectStore::default();
        let a = store.create_folder(None, "a").unwrap();
        let b = store.create_folder(Some(a.id), "b").unwrap();
        let file = store.create_file(Some(b.id), "c.html", "", None).unwrap();
        store.set_active_file(file.id).unwrap();

        store.delete_folder(a.id).unwrap();
        assert!(store.state().open_files.is_empty());
        assert_eq!(store.state().active_file_id, None);
    }

    #[test]
    fn test_delete_file_picks_previous_open() {
        let mut store = ProjectStore::default();
        let a = store.create_file(None, "a.html", "", None).unwrap();
        let b = store.create_file(None, "b.html", "", None).unwrap();
        store.set_active_file(a.id).unwrap();
        store.set_active_file(b.id).unwrap();

        store.delete_file(b.id).unwrap();
        assert_eq!(store.state().active_file_id, Some(a.id));
        assert_eq!(store.state().open_files, vec![a.id]);
        assert!(matches!(store.get(b.id), Err(InaiError::NotFound { .. })));
    }

    #[test]
    fn test_delete_wrong_kind_is_invalid_parent() {
        let mut store = ProjectStore::default();
        let folder = store.create_folder(None, "img").unwrap();
        let file = store.create_file(None, "a.css", "", None).unwrap();
        let root = store.root_id();
        assert!(matches!(store.delete_file(folder.id), Err(InaiError::InvalidParent { .. })));
        assert!(matches!(store.delete_folder(file.id), Err(InaiError::InvalidParent { .. })));
        assert!(matches!(store.delete_folder(root), Err(InaiError::InvalidParent { .. })));
        assert_eq!(store.state().root.children().len(), 2);
    }

    #[test]
    fn test_rename_repaths_descendants() {
        let mut store = ProjectStore::default();
        let css = store.create_folder(None, "css").unwrap();
        let file = store.create_file(Some(css.id), "site.css", "x", None).unwrap();

        store.rename_file(css.id, "styles").unwrap();
        assert_eq!(store.get(file.id).unwrap().path, "styles/site.css");
        assert!(store.find_by_path("css/site.css").is_none());

        store.rename_file(file.id, "main.css").unwrap();
        assert_eq!(store.find_by_path("styles/main.css").unwrap().id, file.id);
        assert!(store.rename_file(file.id, "a/b.css").is_err());
    }

    #[test]
    fn test_close_folder_is_invalid_parent() {
        let mut store = ProjectStore::default();
        let folder = store.create_folder(None, "img").unwrap();
        let mut rx = store.subscribe();
        assert!(matches!(store.close_file(folder.id), Err(InaiError::InvalidParent { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_toggle_folder() {
        let mut store = ProjectStore::default();
        let folder = store.create_folder(None, "img").unwrap();
        assert!(!store.toggle_folder(folder.id).unwrap());
        assert!(store.toggle_folder(folder.id).unwrap());
        let file = store.create_file(None, "a.css", "", None).unwrap();
        assert!(store.toggle_folder(file.id).is_err());
    }

    #[test]
    fn test_import_failure_keeps_tree() {
        let mut store = ProjectStore::default();
        store.create_file(None, "keep.html", "k", None).unwrap();
        let err = store
            .import_project_structure(&[
                ImportEntry::new("ok.css", ""),
                ImportEntry::new("../escape.js", ""),
            ])
            .unwrap_err();
        assert!(matches!(err, InaiError::InvalidPath { .. }));
        assert!(store.find_by_path("keep.html").is_some());
        assert!(store.find_by_path("ok.css").is_none());
    }

    #[test]
    fn test_html_entry_fallback() {
        let mut store = ProjectStore::default();
        store.upsert_file_by_path("styles.css", "", None).unwrap();
        store.upsert_file_by_path("pages/about.html", "", None).unwrap();
        assert_eq!(store.html_entry().unwrap().path, "pages/about.html");
        store.upsert_file_by_path("/index.html", "", None).unwrap();
        assert_eq!(store.html_entry().unwrap().path, "index.html");
    }
}
