//! Structural element paths.
//!
//! A path is a sequence of element-child indices starting at the path root
//! (`<body>` children for a full document, top-level nodes for a fragment).
//! Text, comment and other non-element nodes are skipped when counting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::{Element, Fragment, Node};
use crate::error::{MarkupError, MarkupResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementPath(Vec<usize>);

impl ElementPath {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of the parent element, or `None` at the root.
    pub fn parent(&self) -> Option<ElementPath> {
        self.0
            .split_last()
            .map(|(_, rest)| ElementPath(rest.to_vec()))
    }

    pub fn child(&self, index: usize) -> ElementPath {
        let mut indices = self.0.clone();
        indices.push(index);
        ElementPath(indices)
    }

    /// Resolve against a parsed tree.
    pub fn resolve<'a>(&self, fragment: &'a Fragment) -> MarkupResult<&'a Element> {
        self.locate(fragment).map(|(_, el)| el)
    }

    /// Mutable twin of [`ElementPath::resolve`].
    pub fn resolve_mut<'a>(&self, fragment: &'a mut Fragment) -> MarkupResult<&'a mut Element> {
        let route = self.locate(fragment)?.0;
        let (&target, parents) = route.split_last().ok_or(MarkupError::EmptyPath)?;
        let mut nodes: &mut [Node] = fragment.nodes.as_mut_slice();
        for &i in parents {
            nodes = self.element_at_mut(nodes, i)?.children.as_mut_slice();
        }
        self.element_at_mut(nodes, target)
    }

    /// Walks the path the way the browser counts it. Returns the raw node
    /// indices from the top level down to the element, and the element.
    fn locate<'a>(&self, fragment: &'a Fragment) -> MarkupResult<(Vec<usize>, &'a Element)> {
        let last = self.0.len().checked_sub(1).ok_or(MarkupError::EmptyPath)?;
        let mut level = Level::root(fragment);
        for (depth, &index) in self.0.iter().enumerate() {
            let slot = level
                .slots
                .get(index)
                .cloned()
                .ok_or_else(|| self.not_found(depth, index))?;
            match slot {
                Slot::Node(i) => {
                    let nodes = level.nodes;
                    let el = nodes
                        .get(i)
                        .and_then(Node::as_element)
                        .ok_or_else(|| self.not_found(depth, index))?;
                    level.route.push(i);
                    if depth == last {
                        return Ok((level.route, el));
                    }
                    level = Level::inside(level.route, el);
                }
                Slot::ImpliedTbody(rows) => {
                    if depth == last {
                        return Err(MarkupError::ImpliedElement {
                            path: self.to_string(),
                            tag: "tbody".to_string(),
                        });
                    }
                    level.slots = rows.into_iter().map(Slot::Node).collect();
                }
            }
        }
        Err(MarkupError::EmptyPath)
    }

    fn element_at_mut<'a>(&self, nodes: &'a mut [Node], i: usize) -> MarkupResult<&'a mut Element> {
        nodes
            .get_mut(i)
            .and_then(Node::as_element_mut)
            .ok_or_else(|| MarkupError::PathNotFound {
                path: self.to_string(),
                depth: 0,
                index: i,
            })
    }

    fn not_found(&self, depth: usize, index: usize) -> MarkupError {
        MarkupError::PathNotFound {
            path: self.to_string(),
            depth,
            index,
        }
    }
}

impl From<Vec<usize>> for ElementPath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl From<&[usize]> for ElementPath {
    fn from(indices: &[usize]) -> Self {
        Self(indices.to_vec())
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

/// Accepts `0.1.2`, `0,1,2`, `[0, 1, 2]` and `0/1/2`.
impl FromStr for ElementPath {
    type Err = MarkupError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed)
            .trim();
        if inner.is_empty() {
            return Ok(ElementPath::default());
        }
        inner
            .split(['.', ',', '/'])
            .map(|part| {
                part.trim().parse::<usize>().map_err(|_| MarkupError::InvalidPath {
                    input: input.to_string(),
                    reason: format!("'{}' is not a child index", part.trim()),
                })
            })
            .collect::<MarkupResult<Vec<_>>>()
            .map(ElementPath)
    }
}

/// One element position as the browser numbers it. Rows written directly
/// under `<table>` sit inside a `<tbody>` the browser inserts, which has no
/// node in the source.
#[derive(Debug, Clone)]
enum Slot {
    Node(usize),
    ImpliedTbody(Vec<usize>),
}

/// The container a path step counts in: the raw route to it, its child
/// nodes, and the countable positions among them.
struct Level<'a> {
    route: Vec<usize>,
    nodes: &'a [Node],
    slots: Vec<Slot>,
}

impl<'a> Level<'a> {
    /// Paths start at `<body>` children. Without a `<body>` the browser
    /// implies one holding everything after the head content.
    fn root(fragment: &'a Fragment) -> Self {
        let top = fragment.nodes.as_slice();
        let mut has_head = false;
        for (i, el) in elements(top) {
            match el.name() {
                "body" => return Level::inside(vec![i], el),
                "html" => {
                    return match elements(&el.children).find(|(_, c)| c.name() == "body") {
                        Some((b, body)) => Level::inside(vec![i, b], body),
                        None => Level {
                            route: vec![i],
                            nodes: &el.children,
                            slots: slots_outside_head(&el.children),
                        },
                    };
                }
                "head" => has_head = true,
                _ => {}
            }
        }
        let slots = if has_head || has_doctype(top) {
            slots_outside_head(top)
        } else {
            slots(top, "")
        };
        Level {
            route: Vec::new(),
            nodes: top,
            slots,
        }
    }

    fn inside(route: Vec<usize>, el: &'a Element) -> Self {
        Level {
            route,
            nodes: &el.children,
            slots: slots(&el.children, el.name()),
        }
    }
}

fn elements(nodes: &[Node]) -> impl Iterator<Item = (usize, &Element)> {
    nodes
        .iter()
        .enumerate()
        .filter_map(|(i, n)| n.as_element().map(|el| (i, el)))
}

fn slots(nodes: &[Node], container: &str) -> Vec<Slot> {
    let mut out: Vec<Slot> = Vec::new();
    for (i, el) in elements(nodes) {
        if container == "table" && el.name() == "tr" {
            if let Some(Slot::ImpliedTbody(rows)) = out.last_mut() {
                rows.push(i);
                continue;
            }
            out.push(Slot::ImpliedTbody(vec![i]));
        } else {
            out.push(Slot::Node(i));
        }
    }
    out
}

/// Elements the browser keeps in `<head>` until body content starts.
const HEAD_CONTENT: &[&str] = &[
    "base", "link", "meta", "noscript", "script", "style", "template", "title",
];

fn slots_outside_head(nodes: &[Node]) -> Vec<Slot> {
    let mut in_head = true;
    elements(nodes)
        .filter(|(_, el)| {
            in_head &= el.name() == "head" || HEAD_CONTENT.contains(&el.name());
            !in_head && el.name() != "head"
        })
        .map(|(i, _)| Slot::Node(i))
        .collect()
}

fn has_doctype(nodes: &[Node]) -> bool {
    nodes.iter().any(|n| {
        matches!(n, Node::Other(s) if s.get(..9).is_some_and(|p| p.eq_ignore_ascii_case("<!doctype")))
    })
}
