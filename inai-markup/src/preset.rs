//! Fixed catalog of one-click style presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::Element;
use crate::error::MarkupError;

/// Class the base stylesheet pairs with a `:hover` transform rule.
pub const HOVER_SCALE_CLASS: &str = "inai-hover-scale";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Preset {
    Gradient,
    Shadow,
    Border,
    Glass,
    Pill,
    HoverScale,
}

/// How a preset rule treats a property that is already set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMode {
    /// The preset exists to set this property; always written.
    Targeted,
    /// Only written when the element has no value yet.
    IfAbsent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetRule {
    pub property: &'static str,
    pub value: &'static str,
    pub mode: RuleMode,
}

const fn targeted(property: &'static str, value: &'static str) -> PresetRule {
    PresetRule {
        property,
        value,
        mode: RuleMode::Targeted,
    }
}

const fn if_absent(property: &'static str, value: &'static str) -> PresetRule {
    PresetRule {
        property,
        value,
        mode: RuleMode::IfAbsent,
    }
}

const GRADIENT: &[PresetRule] = &[
    targeted("background-image", "linear-gradient(135deg, #6366f1 0%, #a855f7 100%)"),
    if_absent("color", "#ffffff"),
];

const SHADOW: &[PresetRule] = &[targeted(
    "box-shadow",
    "0 10px 25px -5px rgba(0, 0, 0, 0.15), 0 8px 10px -6px rgba(0, 0, 0, 0.1)",
)];

const BORDER: &[PresetRule] = &[
    targeted("border", "1px solid rgba(0, 0, 0, 0.08)"),
    if_absent("border-radius", "8px"),
];

const GLASS: &[PresetRule] = &[
    targeted("backdrop-filter", "blur(12px)"),
    targeted("-webkit-backdrop-filter", "blur(12px)"),
    if_absent("background-color", "rgba(255, 255, 255, 0.15)"),
    if_absent("border", "1px solid rgba(255, 255, 255, 0.25)"),
];

const PILL: &[PresetRule] = &[
    targeted("border-radius", "9999px"),
    if_absent("padding", "0.5rem 1.25rem"),
];

const HOVER_SCALE: &[PresetRule] = &[targeted("transition", "transform 0.2s ease")];

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Gradient,
        Preset::Shadow,
        Preset::Border,
        Preset::Glass,
        Preset::Pill,
        Preset::HoverScale,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Gradient => "gradient",
            Preset::Shadow => "shadow",
            Preset::Border => "border",
            Preset::Glass => "glass",
            Preset::Pill => "pill",
            Preset::HoverScale => "hover-scale",
        }
    }

    pub fn rules(self) -> &'static [PresetRule] {
        match self {
            Preset::Gradient => GRADIENT,
            Preset::Shadow => SHADOW,
            Preset::Border => BORDER,
            Preset::Glass => GLASS,
            Preset::Pill => PILL,
            Preset::HoverScale => HOVER_SCALE,
        }
    }

    /// Class token the preset relies on, if any.
    pub fn class(self) -> Option<&'static str> {
        match self {
            Preset::HoverScale => Some(HOVER_SCALE_CLASS),
            _ => None,
        }
    }

    /// Writes the preset's style bundle (and class) onto an element.
    pub fn apply(self, element: &mut Element) {
        let mut style = element.style();
        for rule in self.rules() {
            if rule.mode == RuleMode::Targeted || !style.contains(rule.property) {
                style.set(rule.property, rule.value);
            }
        }
        element.set_style(&style);

        if let Some(class) = self.class() {
            let mut classes: Vec<String> =
                element.class_list().into_iter().map(str::to_string).collect();
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
                element.set_class_list(&classes);
            }
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = MarkupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match key.as_str() {
            "gradient" | "gradient-background" => Ok(Preset::Gradient),
            "shadow" | "drop-shadow" => Ok(Preset::Shadow),
            "border" | "subtle-border" => Ok(Preset::Border),
            "glass" | "glass-blur" | "glassmorphism" => Ok(Preset::Glass),
            "pill" | "pill-shape" => Ok(Preset::Pill),
            "hover-scale" | "hoverscale" | "scale" => Ok(Preset::HoverScale),
            _ => Err(MarkupError::UnknownPreset {
                name: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Preset {
    type Error = MarkupError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Preset> for String {
    fn from(p: Preset) -> Self {
        p.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_fragment;

    fn first(markup: &str) -> Element {
        parse_fragment(markup).unwrap().nodes[0]
            .as_element()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_aliases() {
        assert_eq!("Drop Shadow".parse::<Preset>().unwrap(), Preset::Shadow);
        assert_eq!("glass_blur".parse::<Preset>().unwrap(), Preset::Glass);
        assert_eq!("hoverScale".parse::<Preset>().unwrap(), Preset::HoverScale);
        assert!(matches!(
            "sparkle".parse::<Preset>(),
            Err(MarkupError::UnknownPreset { .. })
        ));
    }

    #[test]
    fn test_serde_uses_names() {
        let p: Preset = serde_json::from_str("\"pill-shape\"").unwrap();
        assert_eq!(p, Preset::Pill);
        assert_eq!(serde_json::to_string(&Preset::HoverScale).unwrap(), "\"hover-scale\"");
    }

    #[test]
    fn test_if_absent_keeps_user_value() {
        let mut el = first(r#"<div style="color: #111">x</div>"#);
        Preset::Gradient.apply(&mut el);
        let style = el.style();
        assert_eq!(style.get("color"), Some("#111"));
        assert!(style.get("background-image").unwrap().starts_with("linear-gradient"));
    }

    #[test]
    fn test_targeted_overwrites() {
        let mut el = first(r#"<button style="border-radius: 2px">b</button>"#);
        Preset::Pill.apply(&mut el);
        assert_eq!(el.style().get("border-radius"), Some("9999px"));
    }

    #[test]
    fn test_hover_scale_adds_class_once() {
        let mut el = first(r#"<a class="btn">x</a>"#);
        Preset::HoverScale.apply(&mut el);
        Preset::HoverScale.apply(&mut el);
        assert_eq!(el.class_list(), vec!["btn", HOVER_SCALE_CLASS]);
        assert_eq!(el.style().get("transition"), Some("transform 0.2s ease"));
    }

    #[test]
    fn test_every_preset_sets_something() {
        for preset in Preset::ALL {
            let mut el = first("<div></div>");
            preset.apply(&mut el);
            assert!(!el.style().is_empty(), "{} left no style", preset);
        }
    }
}
