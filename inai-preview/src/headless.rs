//! In-process sandbox surface.
//!
//! Parses the rendered document and reproduces what the injected interaction
//! script does: hover and selection marks, structural paths from `<body>`,
//! link interception and the `ready` handshake. Envelopes are emitted as the
//! same JSON strings the script would `postMessage`.

use std::sync::{Arc, Mutex, MutexGuard};

use inai_markup::{parse_fragment, scrub_class_names, ElementPath, Fragment};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::PreviewResult;
use crate::protocol::{encode, Envelope, HostMessage, SandboxMessage, Selection, SurfaceToken};
use crate::surface::RenderSurface;

const HOVER_CLASS: &str = "inai-hovered";
const SELECTED_CLASS: &str = "inai-selected";

#[derive(Default)]
struct HeadlessState {
    token: Option<SurfaceToken>,
    source: String,
    document: Fragment,
    select_mode: bool,
    hovered: Option<ElementPath>,
    selected: Option<ElementPath>,
    loads: Vec<SurfaceToken>,
    received: Vec<HostMessage>,
}

/// Cloneable handle; clones share one surface.
#[derive(Clone)]
pub struct HeadlessSurface {
    state: Arc<Mutex<HeadlessState>>,
    outbox: mpsc::UnboundedSender<String>,
}

impl HeadlessSurface {
    /// Returns the surface and the stream of envelopes it posts to the host.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        (
            Self {
                state: Arc::new(Mutex::new(HeadlessState::default())),
                outbox,
            },
            rx,
        )
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, token: Option<SurfaceToken>, message: SandboxMessage) {
        let envelope = Envelope {
            source: token,
            message,
        };
        // A closed outbox means the host went away; postMessage is fire-and-forget too.
        let _ = self.outbox.send(encode(&envelope));
    }

    pub fn token(&self) -> Option<SurfaceToken> {
        self.lock().token
    }

    pub fn load_count(&self) -> usize {
        self.lock().loads.len()
    }

    /// The document as last loaded, before any marks.
    pub fn source(&self) -> String {
        self.lock().source.clone()
    }

    pub fn select_mode(&self) -> bool {
        self.lock().select_mode
    }

    pub fn hovered(&self) -> Option<ElementPath> {
        self.lock().hovered.clone()
    }

    pub fn selected(&self) -> Option<ElementPath> {
        self.lock().selected.clone()
    }

    pub fn received(&self) -> Vec<HostMessage> {
        self.lock().received.clone()
    }

    /// Live class attribute of an element, marks included.
    pub fn class_names(&self, path: &ElementPath) -> Option<String> {
        let state = self.lock();
        let el = path.resolve(&state.document).ok()?;
        Some(el.class_list().join(" "))
    }

    /// Pointer enters the element at `path`. Returns whether it became hovered.
    pub fn hover(&self, path: &ElementPath) -> bool {
        let mut state = self.lock();
        if !state.select_mode || path.is_empty() || state.hovered.as_ref() == Some(path) {
            return false;
        }
        if path.resolve(&state.document).is_err() {
            return false;
        }
        if let Some(prev) = state.hovered.take() {
            set_mark(&mut state.document, &prev, HOVER_CLASS, false);
        }
        set_mark(&mut state.document, path, HOVER_CLASS, true);
        state.hovered = Some(path.clone());
        true
    }

    /// Click on the element at `path`. Returns whether a message was posted.
    pub fn click(&self, path: &ElementPath) -> bool {
        let mut state = self.lock();
        let token = state.token;
        if path.is_empty() {
            return false;
        }

        if state.select_mode {
            let selection = match path.resolve(&state.document) {
                Ok(el) => Selection {
                    path: path.clone(),
                    tag_name: el.name().to_ascii_uppercase(),
                    text_content: el.text_content(),
                    class_names: scrub_class_names(&el.class_list().join(" ")),
                },
                Err(_) => return false,
            };
            if let Some(prev) = state.selected.take() {
                set_mark(&mut state.document, &prev, SELECTED_CLASS, false);
            }
            set_mark(&mut state.document, path, SELECTED_CLASS, true);
            state.selected = Some(path.clone());
            drop(state);
            self.emit(token, SandboxMessage::Select(selection));
            return true;
        }

        let target = closest_link(&state.document, path).and_then(|href| internal_link_target(&href));
        drop(state);
        match target {
            Some(path) => {
                self.emit(token, SandboxMessage::Navigate { path });
                true
            }
            None => false,
        }
    }

    pub fn report_height(&self, height: f64) {
        let token = self.lock().token;
        self.emit(token, SandboxMessage::Resize { height });
    }
}

impl RenderSurface for HeadlessSurface {
    fn load(&mut self, token: SurfaceToken, document: &str) -> PreviewResult<()> {
        let parsed = parse_fragment(document)?;
        {
            let mut state = self.lock();
            state.token = Some(token);
            state.source = document.to_string();
            state.document = parsed;
            state.select_mode = false;
            state.hovered = None;
            state.selected = None;
            state.loads.push(token);
        }
        self.emit(Some(token), SandboxMessage::Ready);
        Ok(())
    }

    fn post(&mut self, token: SurfaceToken, message: &HostMessage) -> PreviewResult<()> {
        let mut state = self.lock();
        if state.token != Some(token) {
            debug!(token, current = ?state.token, "Dropping message for replaced surface");
            return Ok(());
        }
        state.received.push(*message);
        match *message {
            HostMessage::SelectMode { enabled } => {
                state.select_mode = enabled;
                if !enabled {
                    if let Some(prev) = state.hovered.take() {
                        set_mark(&mut state.document, &prev, HOVER_CLASS, false);
                    }
                    if let Some(prev) = state.selected.take() {
                        set_mark(&mut state.document, &prev, SELECTED_CLASS, false);
                    }
                }
            }
        }
        Ok(())
    }
}

fn set_mark(document: &mut Fragment, path: &ElementPath, class: &str, on: bool) {
    let Ok(el) = path.resolve_mut(document) else {
        return;
    };
    let mut classes: Vec<String> = el
        .class_list()
        .into_iter()
        .filter(|c| *c != class)
        .map(str::to_string)
        .collect();
    if on {
        classes.push(class.to_string());
    }
    el.set_class_list(&classes);
}

/// `href` of the element at `path` or its nearest anchor ancestor.
fn closest_link(document: &Fragment, path: &ElementPath) -> Option<String> {
    (1..=path.len()).rev().find_map(|len| {
        let el = ElementPath::from(&path.indices()[..len]).resolve(document).ok()?;
        if el.name() == "a" {
            el.attr("href").map(str::to_string)
        } else {
            None
        }
    })
}

/// Target of a same-origin link as written, without query or fragment, or
/// `None` when the browser should follow it (fragments, absolute URLs,
/// `mailto:`/`tel:`). A leading `/` is kept to mark a root-relative link; the
/// host resolves everything else against the current page.
pub fn internal_link_target(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("//") || has_scheme(href) {
        return None;
    }
    let mut target = href.split(['#', '?']).next().unwrap_or("");
    while let Some(rest) = target.strip_prefix("./") {
        target = rest;
    }
    if target.starts_with('/') {
        let rest = target.trim_start_matches('/');
        return Some(if rest.is_empty() {
            "/index.html".to_string()
        } else {
            format!("/{}", rest)
        });
    }
    (!target.is_empty()).then(|| target.to_string())
}

fn has_scheme(href: &str) -> bool {
    match href.find(':') {
        Some(colon) => {
            let scheme = &href[..colon];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_link_target() {
        assert_eq!(internal_link_target("about.html").as_deref(), Some("about.html"));
        assert_eq!(internal_link_target("./blog/post.html?x=1#top").as_deref(), Some("blog/post.html"));
        assert_eq!(internal_link_target("/").as_deref(), Some("/index.html"));
        assert_eq!(internal_link_target("/blog/").as_deref(), Some("/blog/"));
        assert_eq!(internal_link_target("../about.html").as_deref(), Some("../about.html"));
        assert_eq!(internal_link_target("?page=2"), None);
        assert_eq!(internal_link_target("#pricing"), None);
        assert_eq!(internal_link_target("https://example.com"), None);
        assert_eq!(internal_link_target("//cdn.example.com/x.js"), None);
        assert_eq!(internal_link_target("mailto:hi@example.com"), None);
        assert_eq!(internal_link_target("tel:+15550100"), None);
    }

    #[test]
    fn test_load_emits_ready_with_token() {
        let (mut surface, mut rx) = HeadlessSurface::new();
        surface.load(5, "<p>x</p>").unwrap();
        let raw = rx.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({"type":"ready","source":5}));
        assert_eq!(surface.load_count(), 1);
    }

    #[test]
    fn test_hover_marks_one_element() {
        let (mut surface, _rx) = HeadlessSurface::new();
        surface.load(1, "<div class=\"a\"></div><p></p>").unwrap();
        surface.post(1, &HostMessage::SelectMode { enabled: true }).unwrap();
        let div = ElementPath::new(vec![0]);
        let p = ElementPath::new(vec![1]);
        assert!(surface.hover(&div));
        assert!(surface.hover(&p));
        assert_eq!(surface.class_names(&div).as_deref(), Some("a"));
        assert_eq!(surface.class_names(&p).as_deref(), Some("inai-hovered"));
        assert!(!surface.hover(&ElementPath::default()));
    }

    #[test]
    fn test_post_to_stale_token_dropped() {
        let (mut surface, _rx) = HeadlessSurface::new();
        surface.load(2, "<p></p>").unwrap();
        surface.post(1, &HostMessage::SelectMode { enabled: true }).unwrap();
        assert!(!surface.select_mode());
        assert!(surface.received().is_empty());
    }
}
