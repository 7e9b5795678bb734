//! Element mutations applied at a structural path.
//!
//! `mutate` is fail-closed: when the markup cannot be parsed or the path does
//! not resolve, the input is returned unchanged. `try_mutate` reports why.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{scrub_class_names, Element, BOOKKEEPING_CLASSES};
use crate::error::{MarkupError, MarkupResult};
use crate::parser::parse_fragment;
use crate::path::ElementPath;
use crate::preset::Preset;
use crate::style::{normalize_opacity, validate_property, validate_value};

/// A pure description of an edit to one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementMutation {
    /// Replace all content with a text node.
    Text { value: String },
    /// Replace the entire class list.
    Classes { value: String },
    /// Set one inline style property. An empty value removes it.
    Style { property: String, value: String },
    Align { value: Alignment },
    Preset { value: Preset },
    /// Append space-separated class tokens.
    AddClass { value: String },
    /// Remove space-separated class tokens.
    RemoveClass { value: String },
    /// Set an attribute; `null` removes it.
    Attribute { name: String, value: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[serde(alias = "start")]
    Left,
    Center,
    #[serde(alias = "end")]
    Right,
    Justify,
}

impl Alignment {
    pub fn as_css(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }
}

impl ElementMutation {
    /// Short label for history entries.
    pub fn label(&self) -> &'static str {
        match self {
            ElementMutation::Text { .. } => "text",
            ElementMutation::Classes { .. } => "classes",
            ElementMutation::Style { .. } => "style",
            ElementMutation::Align { .. } => "align",
            ElementMutation::Preset { .. } => "preset",
            ElementMutation::AddClass { .. } => "add_class",
            ElementMutation::RemoveClass { .. } => "remove_class",
            ElementMutation::Attribute { .. } => "attribute",
        }
    }

    pub fn apply(&self, el: &mut Element) -> MarkupResult<()> {
        match self {
            ElementMutation::Text { value } => el.set_text(value),
            ElementMutation::Classes { value } => {
                let scrubbed = scrub_class_names(value);
                let tokens: Vec<&str> = scrubbed.split_whitespace().collect();
                el.set_class_list(&tokens);
            }
            ElementMutation::Style { property, value } => set_style_property(el, property, value)?,
            ElementMutation::Align { value } => {
                let mut style = el.style();
                style.set("text-align", value.as_css());
                el.set_style(&style);
            }
            ElementMutation::Preset { value } => value.apply(el),
            ElementMutation::AddClass { value } => {
                let mut classes: Vec<String> =
                    el.class_list().into_iter().map(str::to_string).collect();
                for token in value.split_whitespace() {
                    if BOOKKEEPING_CLASSES.contains(&token) || classes.iter().any(|c| c == token) {
                        continue;
                    }
                    classes.push(token.to_string());
                }
                el.set_class_list(&classes);
            }
            ElementMutation::RemoveClass { value } => {
                let remove: Vec<&str> = value.split_whitespace().collect();
                let classes: Vec<String> = el
                    .class_list()
                    .into_iter()
                    .filter(|c| !remove.contains(c))
                    .map(str::to_string)
                    .collect();
                el.set_class_list(&classes);
            }
            ElementMutation::Attribute { name, value } => set_attribute(el, name, value.as_deref())?,
        }
        Ok(())
    }
}

fn set_style_property(el: &mut Element, property: &str, value: &str) -> MarkupResult<()> {
    let property = validate_property(property)?;
    let mut style = el.style();
    if value.trim().is_empty() {
        style.remove(&property);
    } else {
        let value = if property == "opacity" {
            normalize_opacity(value)?
        } else {
            validate_value(&property, value)?
        };
        style.set(&property, &value);
    }
    el.set_style(&style);
    Ok(())
}

fn set_attribute(el: &mut Element, name: &str, value: Option<&str>) -> MarkupResult<()> {
    let name = name.trim();
    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));
    if !valid_name {
        return Err(MarkupError::InvalidMutation(format!(
            "'{}' is not an attribute name",
            name
        )));
    }
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("on") {
        return Err(MarkupError::UnsafeAttribute { name: lower });
    }
    match value {
        None => {
            el.remove_attr(&lower);
        }
        Some(v) => {
            let compact: String = v.chars().filter(|c| !c.is_whitespace()).collect();
            if compact.to_ascii_lowercase().starts_with("javascript:") {
                return Err(MarkupError::UnsafeAttribute { name: lower });
            }
            if lower == "class" {
                el.set_attr(&lower, &scrub_class_names(v));
            } else {
                el.set_attr(&lower, v);
            }
        }
    }
    Ok(())
}

/// Applies `f` to the element at `path` and serializes the result.
pub fn try_mutate<F>(markup: &str, path: &ElementPath, f: F) -> MarkupResult<String>
where
    F: FnOnce(&mut Element) -> MarkupResult<()>,
{
    let mut fragment = parse_fragment(markup)?;
    let el = path.resolve_mut(&mut fragment)?;
    f(el)?;
    Ok(fragment.to_html())
}

/// Infallible twin of [`try_mutate`]; returns `markup` unchanged on any failure.
pub fn mutate<F>(markup: &str, path: &ElementPath, f: F) -> String
where
    F: FnOnce(&mut Element),
{
    try_mutate(markup, path, |el| {
        f(el);
        Ok(())
    })
    .unwrap_or_else(|err| {
        debug!(%path, error = %err, "Mutation skipped");
        markup.to_string()
    })
}

pub fn try_apply_mutation(
    markup: &str,
    path: &ElementPath,
    mutation: &ElementMutation,
) -> MarkupResult<String> {
    try_mutate(markup, path, |el| mutation.apply(el))
}

pub fn apply_mutation(markup: &str, path: &ElementPath, mutation: &ElementMutation) -> String {
    try_apply_mutation(markup, path, mutation).unwrap_or_else(|err| {
        debug!(%path, error = %err, kind = mutation.label(), "Mutation skipped");
        markup.to_string()
    })
}

/// Snapshot of an addressed element, as the sandbox reports on selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub tag_name: String,
    pub text_content: String,
    pub class_names: String,
}

/// Reads tag, text and scrubbed classes of the element at `path`.
pub fn inspect(markup: &str, path: &ElementPath) -> MarkupResult<ElementSnapshot> {
    let fragment = parse_fragment(markup)?;
    let el = path.resolve(&fragment)?;
    Ok(ElementSnapshot {
        tag_name: el.name().to_ascii_uppercase(),
        text_content: el.text_content(),
        class_names: scrub_class_names(el.attr("class").unwrap_or("")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &[usize]) -> ElementPath {
        ElementPath::from(p)
    }

    #[test]
    fn test_wire_form() {
        let m: ElementMutation = serde_json::from_str(r#"{"type":"text","value":"Hello"}"#).unwrap();
        assert_eq!(m, ElementMutation::Text { value: "Hello".into() });
        let m: ElementMutation =
            serde_json::from_str(r#"{"type":"style","property":"color","value":"red"}"#).unwrap();
        assert_eq!(m.label(), "style");
        let m: ElementMutation =
            serde_json::from_str(r#"{"type":"align","value":"start"}"#).unwrap();
        assert_eq!(m, ElementMutation::Align { value: Alignment::Left });
        let m: ElementMutation =
            serde_json::from_str(r#"{"type":"preset","value":"glassmorphism"}"#).unwrap();
        assert_eq!(m, ElementMutation::Preset { value: Preset::Glass });
        assert!(serde_json::from_str::<ElementMutation>(r#"{"type":"explode"}"#).is_err());
    }

    #[test]
    fn test_text_mutation() {
        let out = apply_mutation(
            "<div><h1>Hi</h1><p>Lo</p></div>",
            &path(&[0, 0]),
            &ElementMutation::Text { value: "Hello".into() },
        );
        assert_eq!(out, "<div><h1>Hello</h1><p>Lo</p></div>");
    }

    #[test]
    fn test_classes_are_scrubbed() {
        let out = apply_mutation(
            "<p class='a'>x</p>",
            &path(&[0]),
            &ElementMutation::Classes { value: "b inai-selected c".into() },
        );
        assert_eq!(out, "<p class=\"b c\">x</p>");
    }

    #[test]
    fn test_opacity_converted() {
        let out = apply_mutation(
            "<p>x</p>",
            &path(&[0]),
            &ElementMutation::Style { property: "opacity".into(), value: "40".into() },
        );
        assert_eq!(out, "<p style=\"opacity: 0.4\">x</p>");
    }

    #[test]
    fn test_empty_style_value_removes() {
        let out = apply_mutation(
            "<p style=\"color: red\">x</p>",
            &path(&[0]),
            &ElementMutation::Style { property: "color".into(), value: " ".into() },
        );
        assert_eq!(out, "<p>x</p>");
    }

    #[test]
    fn test_align() {
        let out = apply_mutation(
            "<p style=\"color: red\">x</p>",
            &path(&[0]),
            &ElementMutation::Align { value: Alignment::Center },
        );
        assert_eq!(out, "<p style=\"color: red; text-align: center\">x</p>");
    }

    #[test]
    fn test_add_and_remove_class() {
        let added = apply_mutation(
            "<p class=\"a\">x</p>",
            &path(&[0]),
            &ElementMutation::AddClass { value: "b a inai-hovered".into() },
        );
        assert_eq!(added, "<p class=\"a b\">x</p>");
        let removed = apply_mutation(
            &added,
            &path(&[0]),
            &ElementMutation::RemoveClass { value: "a b".into() },
        );
        assert_eq!(removed, "<p>x</p>");
    }

    #[test]
    fn test_event_handler_attribute_refused() {
        let err = try_apply_mutation(
            "<p>x</p>",
            &path(&[0]),
            &ElementMutation::Attribute { name: "onClick".into(), value: Some("evil()".into()) },
        )
        .unwrap_err();
        assert_eq!(err, MarkupError::UnsafeAttribute { name: "onclick".into() });

        let err = try_apply_mutation(
            "<a>x</a>",
            &path(&[0]),
            &ElementMutation::Attribute {
                name: "href".into(),
                value: Some(" java script:alert(1)".into()),
            },
        )
        .unwrap_err();
        assert!(matches!(err, MarkupError::UnsafeAttribute { .. }));
    }

    #[test]
    fn test_attribute_set_and_remove() {
        let out = apply_mutation(
            "<a href=\"/a\">x</a>",
            &path(&[0]),
            &ElementMutation::Attribute { name: "href".into(), value: Some("/b".into()) },
        );
        assert_eq!(out, "<a href=\"/b\">x</a>");
        let out = apply_mutation(
            &out,
            &path(&[0]),
            &ElementMutation::Attribute { name: "href".into(), value: None },
        );
        assert_eq!(out, "<a>x</a>");
    }

    #[test]
    fn test_failed_mutation_returns_input() {
        let src = "<div><p>x</p></div>";
        let bad_style = ElementMutation::Style { property: "color".into(), value: "red;}".into() };
        assert_eq!(apply_mutation(src, &path(&[0, 0]), &bad_style), src);
        assert_eq!(mutate(src, &path(&[5]), |el| el.set_text("nope")), src);
        assert_eq!(mutate(src, &path(&[]), |el| el.set_text("nope")), src);
    }

    #[test]
    fn test_inspect() {
        let snap = inspect(
            "<main><button class=\"btn inai-selected\">Go &amp; see</button></main>",
            &path(&[0, 0]),
        )
        .unwrap();
        assert_eq!(
            snap,
            ElementSnapshot {
                tag_name: "BUTTON".into(),
                text_content: "Go & see".into(),
                class_names: "btn".into(),
            }
        );
    }
}
