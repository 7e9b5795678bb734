//! Assembles HTML/CSS/JS into one document for the sandboxed surface.
//!
//! Complete documents get styles and scripts spliced in at `</head>` and
//! `</body>`; fragments are wrapped in a fresh document. Neither path
//! re-serializes the author's markup.

use std::fmt::Write;
use std::fs;
use std::path::Path;

use inai_markup::escape::escape_attr;
use inai_markup::HOVER_SCALE_CLASS;

use crate::error::PreviewResult;

/// Outline styles for the hover/selection bookkeeping classes.
const MARK_STYLES: &str = ".inai-hovered{outline:2px dashed #6366f1 !important;outline-offset:2px;cursor:pointer;}\
.inai-selected{outline:2px solid #6366f1 !important;outline-offset:2px;}";

/// Rules presets depend on beyond their inline declarations.
pub const PRESET_STYLES: &str = ".inai-hover-scale{transition:transform .2s ease;}\
.inai-hover-scale:hover{transform:scale(1.05);}";

pub const INTERACTION_SCRIPT: &str = include_str!("../assets/interaction.js");

/// Sandbox flags for the preview frame. Never includes `allow-same-origin`.
pub const SANDBOX_FLAGS: &str = "allow-scripts allow-forms allow-popups allow-modals";

/// Frame name prefix; the interaction script parses its token from `window.name`.
pub const SURFACE_NAME_PREFIX: &str = "inai-surface-";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewSources {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl PreviewSources {
    pub fn new(html: impl Into<String>, css: impl Into<String>, js: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            js: js.into(),
        }
    }
}

/// True when the markup carries its own `<html>`, `<body>` or doctype.
pub fn is_full_document(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    lower.contains("<html") || lower.contains("<body") || lower.trim_start().starts_with("<!doctype")
}

/// Builds the interactive preview document.
pub fn assemble(sources: &PreviewSources) -> String {
    let mut head = String::new();
    let _ = write!(
        head,
        "<style id=\"inai-base\">{}{}</style>",
        MARK_STYLES, PRESET_STYLES
    );
    if !sources.css.trim().is_empty() {
        let _ = write!(head, "\n<style>{}</style>", neutralize_end_tag(&sources.css, "style"));
    }

    let mut tail = String::new();
    if !sources.js.trim().is_empty() {
        let _ = write!(tail, "<script>{}</script>\n", neutralize_end_tag(&sources.js, "script"));
    }
    let _ = write!(
        tail,
        "<script id=\"inai-interaction\">{}</script>",
        neutralize_end_tag(INTERACTION_SCRIPT, "script")
    );

    if is_full_document(&sources.html) {
        let with_head = inject_head(&sources.html, &head);
        inject_body_end(&with_head, &tail)
    } else {
        wrap_fragment(&sources.html, &head, &tail)
    }
}

/// `<iframe>` markup hosting a document in the sandbox.
pub fn srcdoc_frame(document: &str, token: u64) -> String {
    format!(
        "<iframe name=\"{}{}\" title=\"Preview\" sandbox=\"{}\" srcdoc=\"{}\" style=\"width:100%;border:0;\"></iframe>",
        SURFACE_NAME_PREFIX,
        token,
        SANDBOX_FLAGS,
        escape_attr(document)
    )
}

fn wrap_fragment(body: &str, head: &str, tail: &str) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
{}
</head>
<body>
{}
{}
</body>
</html>
"#,
        head, body, tail
    );
    html
}

fn inject_head(doc: &str, block: &str) -> String {
    let lower = doc.to_ascii_lowercase();
    let at = lower
        .find("</head>")
        .or_else(|| lower.find("<body"))
        .or_else(|| open_tag_end(&lower, "<html"))
        .or_else(|| open_tag_end(&lower, "<!doctype"))
        .unwrap_or(0);
    splice(doc, at, block)
}

fn inject_body_end(doc: &str, block: &str) -> String {
    let lower = doc.to_ascii_lowercase();
    let at = lower
        .rfind("</body>")
        .or_else(|| lower.rfind("</html>"))
        .unwrap_or(doc.len());
    splice(doc, at, block)
}

fn splice(doc: &str, at: usize, block: &str) -> String {
    let mut out = String::with_capacity(doc.len() + block.len() + 2);
    out.push_str(&doc[..at]);
    out.push_str(block);
    out.push('\n');
    out.push_str(&doc[at..]);
    out
}

/// Byte offset just past the `>` of the first `tag` start tag.
fn open_tag_end(lower: &str, tag: &str) -> Option<usize> {
    let start = lower.find(tag)?;
    lower[start..].find('>').map(|i| start + i + 1)
}

/// Stops embedded CSS/JS from closing its own element early.
fn neutralize_end_tag(src: &str, tag: &str) -> String {
    let needle = format!("</{}", tag);
    let lower = src.to_ascii_lowercase();
    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    for (i, _) in lower.match_indices(&needle) {
        out.push_str(&src[last..i]);
        out.push_str("<\\/");
        last = i + 2;
    }
    out.push_str(&src[last..]);
    out
}

/// Downloadable artifact: `index.html` linking its two sibling files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBundle {
    pub index_html: String,
    pub styles_css: String,
    pub script_js: String,
}

impl ExportBundle {
    pub fn from_sources(sources: &PreviewSources) -> Self {
        let link = "<link rel=\"stylesheet\" href=\"styles.css\">";
        let script = "<script src=\"script.js\"></script>";

        let index_html = if is_full_document(&sources.html) {
            let lower = sources.html.to_ascii_lowercase();
            let mut doc = sources.html.clone();
            if !lower.contains("href=\"styles.css\"") {
                doc = inject_head(&doc, link);
            }
            if !lower.contains("src=\"script.js\"") {
                doc = inject_body_end(&doc, script);
            }
            doc
        } else {
            let head = format!("<title>Page</title>\n{}", link);
            wrap_fragment(&sources.html, &head, script)
        };

        let mut styles_css = sources.css.clone();
        if sources.html.contains(HOVER_SCALE_CLASS) && !styles_css.contains(".inai-hover-scale") {
            if !styles_css.is_empty() && !styles_css.ends_with('\n') {
                styles_css.push('\n');
            }
            styles_css.push_str(PRESET_STYLES);
            styles_css.push('\n');
        }

        Self {
            index_html,
            styles_css,
            script_js: sources.js.clone(),
        }
    }

    pub fn files(&self) -> [(&'static str, &str); 3] {
        [
            ("index.html", self.index_html.as_str()),
            ("styles.css", self.styles_css.as_str()),
            ("script.js", self.script_js.as_str()),
        ]
    }

    pub fn write_to(&self, dir: &Path) -> PreviewResult<()> {
        fs::create_dir_all(dir)?;
        for (name, content) in self.files() {
            fs::write(dir.join(name), content)?;
        }
        Ok(())
    }
}
