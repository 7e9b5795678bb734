//! Normalization of single-document responses into the three canonical files.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

pub const INDEX_HTML: &str = "index.html";
pub const STYLES_CSS: &str = "styles.css";
pub const SCRIPT_JS: &str = "script.js";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalFiles {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl CanonicalFiles {
    pub fn entries(&self) -> [(&'static str, &str); 3] {
        [
            (INDEX_HTML, self.html.as_str()),
            (STYLES_CSS, self.css.as_str()),
            (SCRIPT_JS, self.js.as_str()),
        ]
    }
}

fn body_pattern() -> &'static Regex {
    static BODY: OnceLock<Regex> = OnceLock::new();
    BODY.get_or_init(|| Regex::new(r"(?is)<body\b[^>]*>(.*)</body\s*>").unwrap())
}

/// Inner markup of `<body>` when the page carries one, else the page unchanged.
pub fn unwrap_body(page: &str) -> &str {
    match body_pattern().captures(page).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => page,
    }
}

/// `pages[]` or flat `html/css/js`. `None` when neither shape is present.
pub fn normalize_legacy(response: &Value) -> Option<CanonicalFiles> {
    let text = |key: &str| {
        response
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let html = match response.get("pages").and_then(Value::as_array) {
        Some(pages) if !pages.is_empty() => {
            let page = pages.iter().find(|p| is_index_page(p)).unwrap_or(&pages[0]);
            let body = ["body", "html", "content"]
                .iter()
                .find_map(|k| page.get(*k).and_then(Value::as_str))
                .unwrap_or_default();
            unwrap_body(body).to_string()
        }
        _ => response.get("html").and_then(Value::as_str)?.to_string(),
    };

    Some(CanonicalFiles {
        html,
        css: text("css"),
        js: text("js"),
    })
}

fn is_index_page(page: &Value) -> bool {
    let field = |k: &str| {
        page.get(k)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_ascii_lowercase())
    };
    if field("filename").as_deref() == Some(INDEX_HTML) {
        return true;
    }
    ["id", "label", "name"]
        .iter()
        .filter_map(|k| field(k))
        .any(|v| v == "index" || v == "home")
}
