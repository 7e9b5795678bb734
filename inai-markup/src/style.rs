//! Inline `style` attribute model.
//!
//! Declarations keep their source order so rewriting a single property does
//! not reshuffle the rest of the attribute.

use std::fmt;

use crate::error::{MarkupError, MarkupResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclarations {
    decls: Vec<(String, String)>,
}

impl StyleDeclarations {
    /// Parse `"key: val; key2: val2"`. Entries without a colon are dropped.
    pub fn parse(s: &str) -> Self {
        let decls = split_declarations(s)
            .into_iter()
            .filter_map(|entry| {
                let colon = entry.find(':')?;
                let key = entry[..colon].trim();
                let val = entry[colon + 1..].trim();
                if key.is_empty() || val.is_empty() {
                    return None;
                }
                Some((key.to_ascii_lowercase(), val.to_string()))
            })
            .collect();
        Self { decls }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.decls
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(property))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, property: &str) -> bool {
        self.get(property).is_some()
    }

    /// Sets a property in place, or appends it when absent.
    pub fn set(&mut self, property: &str, value: &str) {
        match self
            .decls
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(property))
        {
            Some((_, v)) => *v = value.to_string(),
            None => self
                .decls
                .push((property.to_ascii_lowercase(), value.to_string())),
        }
    }

    pub fn remove(&mut self, property: &str) -> bool {
        let before = self.decls.len();
        self.decls.retain(|(k, _)| !k.eq_ignore_ascii_case(property));
        self.decls.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.decls.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for StyleDeclarations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.decls.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        Ok(())
    }
}

/// Split on `;` outside parentheses and quotes, so `url(a;b)` survives.
fn split_declarations(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

/// Property names: lowercase CSS identifiers or custom properties (`--x`).
pub fn validate_property(property: &str) -> MarkupResult<String> {
    let name = property.trim().to_ascii_lowercase();
    let ident = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    let valid = match name.strip_prefix("--") {
        Some(custom) => !custom.is_empty() && custom.chars().all(ident),
        None => {
            name.len() > 1
                && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '-')
                && name.chars().all(ident)
        }
    };
    if !valid {
        return Err(MarkupError::InvalidStyle {
            property: property.to_string(),
            reason: "not a CSS property name".to_string(),
        });
    }
    Ok(name)
}

/// Values may not break out of the declaration or the attribute.
pub fn validate_value(property: &str, value: &str) -> MarkupResult<String> {
    let value = value.trim();
    if let Some(bad) = value.chars().find(|c| matches!(c, ';' | '{' | '}' | '<' | '>')) {
        return Err(MarkupError::InvalidStyle {
            property: property.to_string(),
            reason: format!("value contains '{}'", bad),
        });
    }
    if value.to_ascii_lowercase().contains("javascript:") {
        return Err(MarkupError::InvalidStyle {
            property: property.to_string(),
            reason: "script URLs are not allowed".to_string(),
        });
    }
    Ok(value.to_string())
}

/// Opacity edits arrive as a 0–100 percentage. Clamp and convert to a fraction.
pub fn normalize_opacity(input: &str) -> MarkupResult<String> {
    let trimmed = input.trim().trim_end_matches('%').trim();
    let percent: f64 = trimmed.parse().map_err(|_| MarkupError::InvalidStyle {
        property: "opacity".to_string(),
        reason: format!("'{}' is not a number", input),
    })?;
    if percent.is_nan() {
        return Err(MarkupError::InvalidStyle {
            property: "opacity".to_string(),
            reason: "NaN".to_string(),
        });
    }
    let fraction = percent.clamp(0.0, 100.0) / 100.0;
    // Round to 4 decimals and drop trailing zeros.
    let rounded = (fraction * 10_000.0).round() / 10_000.0;
    Ok(format!("{}", rounded))
}
