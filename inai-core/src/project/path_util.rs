//! Pure project path handling (string-only, no tree access).
//!
//! Project paths are relative and slash separated: `index.html`,
//! `assets/css/site.css`. They never start with `/` and never escape the
//! project root.

use crate::error::{InaiError, InaiResult};

/// Normalizes an incoming path: backslashes become `/`, a leading `/` is
/// dropped, `.` and `..` are resolved. Fails if the path is empty or climbs
/// above the project root.
///
/// # Examples
///
/// - `normalize("/index.html")` → `"index.html"`
/// - `normalize("./css//site.css")` → `"css/site.css"`
/// - `normalize("blog/../about.html")` → `"about.html"`
/// - `normalize("../etc/passwd")` → error
pub fn normalize(path: &str) -> InaiResult<String> {
    let unified = path.trim().replace('\\', "/");
    let mut out: Vec<&str> = Vec::new();
    for seg in unified.split('/').filter(|p| !p.is_empty()) {
        match seg {
            "." => {}
            ".." => {
                if out.pop().is_none() {
                    return Err(InaiError::invalid_path(path, "escapes the project root"));
                }
            }
            _ => out.push(seg),
        }
    }
    if out.is_empty() {
        return Err(InaiError::invalid_path(path, "empty path"));
    }
    Ok(out.join("/"))
}

/// Resolves a link target against the file it appears in.
///
/// - A target starting with `/` is relative to the project root.
/// - Otherwise it is relative to the folder containing `from_file`.
/// - A target ending in `/` points at that folder's `index.html`.
///
/// # Examples
///
/// - `resolve_relative("blog/post.html", "../about.html")` → `"about.html"`
/// - `resolve_relative("blog/post.html", "next.html")` → `"blog/next.html"`
/// - `resolve_relative("blog/post.html", "/index.html")` → `"index.html"`
pub fn resolve_relative(from_file: &str, target: &str) -> InaiResult<String> {
    let target = target.trim();
    let mut joined = if target.starts_with('/') {
        target.to_string()
    } else {
        let (dir, _) = split_path(from_file);
        if dir.is_empty() {
            target.to_string()
        } else {
            format!("{}/{}", dir, target)
        }
    };
    if joined.ends_with('/') {
        joined.push_str("index.html");
    }
    normalize(&joined)
}

/// Splits into (parent folder path, leaf name). The parent is empty at the root.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

/// Path of a child named `name` inside the folder at `parent`.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// A leaf name: non-empty, no separators, not `.` or `..`.
pub fn validate_name(name: &str) -> InaiResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(InaiError::invalid_path(name, "not a valid file or folder name"));
    }
    Ok(())
}

/// Lowercased extension of the leaf name, if any.
pub fn extension(path: &str) -> Option<String> {
    let (_, name) = split_path(path);
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(name[dot + 1..].to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_leading_slash_and_dots() {
        assert_eq!(normalize("/index.html").unwrap(), "index.html");
        assert_eq!(normalize("./css//site.css").unwrap(), "css/site.css");
        assert_eq!(normalize("a\\b\\c.js").unwrap(), "a/b/c.js");
    }

    #[test]
    fn normalize_dot_dot() {
        assert_eq!(normalize("blog/../about.html").unwrap(), "about.html");
        assert_eq!(normalize("a/b/../c").unwrap(), "a/c");
    }

    #[test]
    fn normalize_rejects_escape_and_empty() {
        assert!(matches!(normalize("../etc/passwd"), Err(InaiError::InvalidPath { .. })));
        assert!(matches!(normalize("a/../../b"), Err(InaiError::InvalidPath { .. })));
        assert!(matches!(normalize("/"), Err(InaiError::InvalidPath { .. })));
        assert!(matches!(normalize(""), Err(InaiError::InvalidPath { .. })));
    }

    #[test]
    fn resolve_relative_to_folder() {
        assert_eq!(resolve_relative("blog/post.html", "next.html").unwrap(), "blog/next.html");
        assert_eq!(resolve_relative("blog/post.html", "../about.html").unwrap(), "about.html");
        assert_eq!(resolve_relative("index.html", "about.html").unwrap(), "about.html");
    }

    #[test]
    fn resolve_absolute_and_folder_links() {
        assert_eq!(resolve_relative("blog/post.html", "/index.html").unwrap(), "index.html");
        assert_eq!(resolve_relative("index.html", "blog/").unwrap(), "blog/index.html");
        assert!(resolve_relative("index.html", "../x.html").is_err());
    }

    #[test]
    fn split_and_join() {
        assert_eq!(split_path("a/b/c.css"), ("a/b", "c.css"));
        assert_eq!(split_path("c.css"), ("", "c.css"));
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a/b", "c"), "a/b/c");
    }

    #[test]
    fn names_and_extensions() {
        assert!(validate_name("site.css").is_ok());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("").is_err());
        assert_eq!(extension("a/Index.HTML").as_deref(), Some("html"));
        assert_eq!(extension(".gitignore"), None);
        assert_eq!(extension("README"), None);
    }
}
