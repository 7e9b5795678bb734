//! File tree nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::path_util;

/// Content language of a file; drives rendering decisions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Html,
    Css,
    Javascript,
    Json,
    Markdown,
    Svg,
    Plaintext,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Language::Html,
            "css" => Language::Css,
            "js" | "mjs" | "cjs" => Language::Javascript,
            "json" => Language::Json,
            "md" | "markdown" => Language::Markdown,
            "svg" => Language::Svg,
            _ => Language::Plaintext,
        }
    }

    pub fn from_path(path: &str) -> Self {
        path_util::extension(path)
            .map(|ext| Self::from_extension(&ext))
            .unwrap_or(Language::Plaintext)
    }

    /// Uses `hint` when it names a known language, else the file extension.
    pub fn detect(hint: Option<&str>, path: &str) -> Self {
        hint.and_then(|h| h.parse().ok())
            .unwrap_or_else(|| Self::from_path(path))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Html => "html",
            Language::Css => "css",
            Language::Javascript => "javascript",
            Language::Json => "json",
            Language::Markdown => "markdown",
            Language::Svg => "svg",
            Language::Plaintext => "plaintext",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient: accepts common aliases and bare extensions (`js`, `text/css`, `md`).
impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let s = s.rsplit('/').next().unwrap_or("");
        match s {
            "html" | "htm" => Ok(Language::Html),
            "css" => Ok(Language::Css),
            "javascript" | "js" | "ecmascript" => Ok(Language::Javascript),
            "json" => Ok(Language::Json),
            "markdown" | "md" => Ok(Language::Markdown),
            "svg" | "svg+xml" => Ok(Language::Svg),
            "plaintext" | "text" | "plain" | "txt" => Ok(Language::Plaintext),
            other => Err(format!("unknown language '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: Uuid,
    pub name: String,
    /// Slash separated, derived from ancestry. Empty for the root.
    pub path: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Kind-specific payload: files carry content, folders carry children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeKind {
    File {
        content: String,
        language: Language,
    },
    Folder {
        children: Vec<FileNode>,
        expanded: bool,
    },
}

impl FileNode {
    pub fn root() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            path: String::new(),
            kind: NodeKind::Folder {
                children: Vec::new(),
                expanded: true,
            },
        }
    }

    pub fn file(name: &str, path: String, content: String, language: Language) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            path,
            kind: NodeKind::File { content, language },
        }
    }

    pub fn folder(name: &str, path: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            path,
            kind: NodeKind::Folder {
                children: Vec::new(),
                expanded: true,
            },
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { content, .. } => Some(content),
            NodeKind::Folder { .. } => None,
        }
    }

    pub fn language(&self) -> Option<Language> {
        match &self.kind {
            NodeKind::File { language, .. } => Some(*language),
            NodeKind::Folder { .. } => None,
        }
    }

    pub fn children(&self) -> &[FileNode] {
        match &self.kind {
            NodeKind::Folder { children, .. } => children,
            NodeKind::File { .. } => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<FileNode>> {
        match &mut self.kind {
            NodeKind::Folder { children, .. } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    pub fn find(&self, id: Uuid) -> Option<&FileNode> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut FileNode> {
        if self.id == id {
            return Some(self);
        }
        self.children_mut()?
            .iter_mut()
            .find_map(|c| c.find_mut(id))
    }

    /// First node (pre-order) whose path equals `path`.
    pub fn find_by_path(&self, path: &str) -> Option<&FileNode> {
        if self.path == path {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find_by_path(path))
    }

    /// Direct child folder of this folder named `name`.
    pub(crate) fn child_folder_id(&self, name: &str) -> Option<Uuid> {
        self.children()
            .iter()
            .find(|c| c.is_folder() && c.name == name)
            .map(|c| c.id)
    }

    /// Detaches the node with `id` from anywhere below `self`.
    pub(crate) fn remove_descendant(&mut self, id: Uuid) -> Option<FileNode> {
        let children = self.children_mut()?;
        if let Some(pos) = children.iter().position(|c| c.id == id) {
            return Some(children.remove(pos));
        }
        children.iter_mut().find_map(|c| c.remove_descendant(id))
    }

    /// Ids of every file in this subtree, self included.
    pub fn collect_file_ids(&self, out: &mut Vec<Uuid>) {
        match &self.kind {
            NodeKind::File { .. } => out.push(self.id),
            NodeKind::Folder { children, .. } => {
                for c in children {
                    c.collect_file_ids(out);
                }
            }
        }
    }

    /// Files of this subtree in tree order.
    pub fn collect_files<'a>(&'a self, out: &mut Vec<&'a FileNode>) {
        match &self.kind {
            NodeKind::File { .. } => out.push(self),
            NodeKind::Folder { children, .. } => {
                for c in children {
                    c.collect_files(out);
                }
            }
        }
    }

    /// Recomputes `path` for this node and its descendants under `parent_path`.
    pub(crate) fn repath(&mut self, parent_path: &str) {
        self.path = path_util::join(parent_path, &self.name);
        let path = self.path.clone();
        if let Some(children) = self.children_mut() {
            for c in children {
                c.repath(&path);
            }
        }
    }

    /// Depth of the deepest node below `self`, 0 for a leaf.
    pub fn height(&self) -> usize {
        self.children()
            .iter()
            .map(|c| c.height() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Number of ancestors of `id` (root children are at depth 1).
    pub fn depth_of(&self, id: Uuid) -> Option<usize> {
        if self.id == id {
            return Some(0);
        }
        self.children()
            .iter()
            .find_map(|c| c.depth_of(id))
            .map(|d| d + 1)
    }

    /// Id of the folder directly containing `id`.
    pub fn parent_of(&self, id: Uuid) -> Option<Uuid> {
        for c in self.children() {
            if c.id == id {
                return Some(self.id);
            }
            if let Some(found) = c.parent_of(id) {
                return Some(found);
            }
        }
        None
    }
}
