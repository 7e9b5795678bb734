//! Lenient HTML parser.
//!
//! Generated markup is frequently truncated or slightly malformed, so the
//! parser never rejects input for syntax: unterminated tags become text,
//! stray end tags are kept verbatim, unclosed elements are closed at EOF.
//! The only hard limit is nesting depth.

use crate::document::{Attribute, Closing, Element, Fragment, Node, RAW_TEXT_ELEMENTS, VOID_ELEMENTS};
use crate::error::{MarkupError, MarkupResult};
use crate::escape::decode_entities;

/// Deepest element nesting accepted. Walks and serialization recurse per level.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Elements whose start tag implicitly closes an open `<p>`.
const P_CLOSERS: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "main", "menu", "nav", "ol", "p", "pre", "section", "table", "ul",
];

/// Parse a markup string (body fragment or full document) into a tree.
pub fn parse_fragment(markup: &str) -> MarkupResult<Fragment> {
    Parser {
        src: markup,
        pos: 0,
        stack: Vec::new(),
        top: Vec::new(),
    }
    .run()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<Element>,
    top: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> MarkupResult<Fragment> {
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            if let Some(body) = rest.strip_prefix("<!--") {
                let len = body.find("-->").map(|i| i + 7).unwrap_or(rest.len());
                self.push_node(Node::Comment(rest[..len].to_string()));
                self.pos += len;
            } else if rest.starts_with("</") && starts_with_letter(&rest[2..]) {
                self.end_tag(rest);
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                let len = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
                self.push_node(Node::Other(rest[..len].to_string()));
                self.pos += len;
            } else if rest.starts_with('<') && starts_with_letter(&rest[1..]) {
                if !self.start_tag(rest)? {
                    // Unterminated start tag: keep the remainder as text.
                    self.push_text(rest);
                    self.pos = self.src.len();
                }
            } else {
                let skip = usize::from(rest.starts_with('<'));
                let len = rest[skip..].find('<').map(|i| i + skip).unwrap_or(rest.len());
                self.push_text(&rest[..len]);
                self.pos += len;
            }
        }

        while !self.stack.is_empty() {
            self.close_top(Closing::Implicit);
        }
        Ok(Fragment { nodes: self.top })
    }

    fn push_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.top.push(node),
        }
    }

    fn push_text(&mut self, text: &str) {
        let siblings = match self.stack.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.top,
        };
        match siblings.last_mut() {
            Some(Node::Text(prev)) => prev.push_str(text),
            _ => siblings.push(Node::Text(text.to_string())),
        }
    }

    fn close_top(&mut self, closing: Closing) {
        if let Some(mut el) = self.stack.pop() {
            el.set_closing(closing);
            self.push_node(Node::Element(el));
        }
    }

    /// Returns `Ok(false)` when the tag never terminates.
    fn start_tag(&mut self, rest: &str) -> MarkupResult<bool> {
        let bytes = rest.as_bytes();
        let len = bytes.len();
        let name_end = 1 + rest[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':' || c == '_'))
            .unwrap_or(len - 1);
        let name = rest[1..name_end].to_ascii_lowercase();

        let mut attrs = Vec::new();
        let mut self_closing = false;
        let mut i = name_end;
        loop {
            i = skip_ws(bytes, i);
            if i >= len {
                return Ok(false);
            }
            match bytes[i] {
                b'>' => {
                    i += 1;
                    break;
                }
                b'/' if bytes.get(i + 1) == Some(&b'>') => {
                    self_closing = true;
                    i += 2;
                    break;
                }
                b'/' => i += 1,
                _ => {
                    let start = i;
                    while i < len
                        && !bytes[i].is_ascii_whitespace()
                        && bytes[i] != b'='
                        && bytes[i] != b'>'
                        && !(bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>'))
                    {
                        i += 1;
                    }
                    if i == start {
                        // Lone '=' where a name was expected.
                        i += 1;
                        continue;
                    }
                    let attr_name = rest[start..i].to_string();
                    let after_name = skip_ws(bytes, i);
                    if after_name < len && bytes[after_name] == b'=' {
                        i = skip_ws(bytes, after_name + 1);
                        if i >= len {
                            return Ok(false);
                        }
                        let value = match bytes[i] {
                            q @ (b'"' | b'\'') => {
                                let Some(close) = rest[i + 1..].find(q as char) else {
                                    return Ok(false);
                                };
                                let v = &rest[i + 1..i + 1 + close];
                                i += close + 2;
                                v
                            }
                            _ => {
                                let s = i;
                                while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                                    i += 1;
                                }
                                &rest[s..i]
                            }
                        };
                        attrs.push(Attribute {
                            name: attr_name,
                            value: Some(decode_entities(value).into_owned()),
                        });
                    } else {
                        attrs.push(Attribute {
                            name: attr_name,
                            value: None,
                        });
                    }
                }
            }
        }

        let raw = rest[..i].to_string();
        self.pos += i;

        if VOID_ELEMENTS.contains(&name.as_str()) {
            self.push_node(Node::Element(Element::parsed(name, attrs, raw, Closing::Void)));
            return Ok(true);
        }
        if self_closing {
            self.push_node(Node::Element(Element::parsed(
                name,
                attrs,
                raw,
                Closing::SelfClosing,
            )));
            return Ok(true);
        }

        while self
            .stack
            .last()
            .is_some_and(|open| implies_close(open.name(), &name))
        {
            self.close_top(Closing::Implicit);
        }

        if self.stack.len() >= MAX_NESTING_DEPTH {
            return Err(MarkupError::MaxNestingDepthExceeded {
                max_depth: MAX_NESTING_DEPTH,
            });
        }

        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.raw_text_element(name, attrs, raw);
        } else {
            self.stack
                .push(Element::parsed(name, attrs, raw, Closing::Implicit));
        }
        Ok(true)
    }

    fn raw_text_element(&mut self, name: String, attrs: Vec<Attribute>, raw: String) {
        let rest = &self.src[self.pos..];
        let needle = format!("</{}", name);
        let mut el = Element::parsed(name, attrs, raw, Closing::Implicit);
        match find_end_tag(rest, &needle) {
            Some(at) => {
                if at > 0 {
                    el.children.push(Node::Text(rest[..at].to_string()));
                }
                let end_len = rest[at..].find('>').map(|i| i + 1).unwrap_or(rest.len() - at);
                el.set_closing(Closing::Explicit(rest[at..at + end_len].to_string()));
                self.pos += at + end_len;
            }
            None => {
                if !rest.is_empty() {
                    el.children.push(Node::Text(rest.to_string()));
                }
                self.pos = self.src.len();
            }
        }
        self.push_node(Node::Element(el));
    }

    fn end_tag(&mut self, rest: &str) {
        let len = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
        let raw = &rest[..len];
        let name = raw[2..]
            .split(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        self.pos += len;

        match self.stack.iter().rposition(|e| e.name() == name) {
            Some(open) => {
                while self.stack.len() > open + 1 {
                    self.close_top(Closing::Implicit);
                }
                self.close_top(Closing::Explicit(raw.to_string()));
            }
            None => self.push_node(Node::Other(raw.to_string())),
        }
    }
}

fn starts_with_letter(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_alphabetic())
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Case-insensitive search for an end tag such as `</script` followed by a delimiter.
fn find_end_tag(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if hay.len() < pat.len() {
        return None;
    }
    (0..=hay.len() - pat.len()).find(|&i| {
        hay[i..i + pat.len()].eq_ignore_ascii_case(pat)
            && hay
                .get(i + pat.len())
                .map_or(true, |&b|b.is_ascii_whitespace() || b == b'>' || b == b'/')
    })
}

fn implies_close(open: &str, new: &str) -> bool {
    match open {
        "p" => P_CLOSERS.contains(&new),
        "li" => new == "li",
        "dt" | "dd" => matches!(new, "dt" | "dd"),
        "option" => matches!(new, "option" | "optgroup"),
        "tr" => new == "tr",
        "td" | "th" => matches!(new, "td" | "th" | "tr"),
        _ => false,
    }
}
