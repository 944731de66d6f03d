//! Art styles and the prompt modifiers they resolve to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Predefined art styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleKey {
    /// Photorealistic rendering. Fallback for unknown keys.
    #[default]
    Realistic,
    /// Comic book art.
    Comic,
    /// Classical oil painting.
    OilPainting,
    /// Black and white pencil sketch.
    Sketch,
    /// Shaded graphite drawing.
    PencilArt,
    /// Cartoon illustration.
    Cartoon,
    /// Anime and manga.
    Anime,
    /// Watercolor painting.
    Watercolor,
    /// Contemporary digital illustration.
    DigitalArt,
}

impl StyleKey {
    /// All styles, in display order.
    pub const ALL: [StyleKey; 9] = [
        Self::Realistic,
        Self::Comic,
        Self::OilPainting,
        Self::Sketch,
        Self::PencilArt,
        Self::Cartoon,
        Self::Anime,
        Self::Watercolor,
        Self::DigitalArt,
    ];

    /// Returns the stable identifier used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realistic => "realistic",
            Self::Comic => "comic",
            Self::OilPainting => "oil-painting",
            Self::Sketch => "sketch",
            Self::PencilArt => "pencil-art",
            Self::Cartoon => "cartoon",
            Self::Anime => "anime",
            Self::Watercolor => "watercolor",
            Self::DigitalArt => "digital-art",
        }
    }

    /// Returns the label shown in style pickers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Realistic => "Realistic",
            Self::Comic => "Comic",
            Self::OilPainting => "Oil Painting",
            Self::Sketch => "Sketch",
            Self::PencilArt => "Pencil Art",
            Self::Cartoon => "Cartoon",
            Self::Anime => "Anime",
            Self::Watercolor => "Watercolor",
            Self::DigitalArt => "Digital Art",
        }
    }

    /// Parses a wire identifier. Exact match only.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == key)
    }

    fn builtin_modifier(&self) -> &'static str {
        match self {
            Self::Realistic => "photorealistic, highly detailed, professional photography",
            Self::Comic => "comic book style, bold lines, vibrant colors, graphic novel art",
            Self::OilPainting => "oil painting style, brush strokes, classical art, museum quality",
            Self::Sketch => "pencil sketch, hand-drawn, artistic sketch, black and white line art",
            Self::PencilArt => "detailed pencil drawing, graphite art, realistic shading, fine art",
            Self::Cartoon => "cartoon style, animated, colorful, fun illustration",
            Self::Anime => "anime style, manga art, Japanese animation style",
            Self::Watercolor => "watercolor painting, soft colors, artistic, flowing paint",
            Self::DigitalArt => "digital art, modern illustration, contemporary style",
        }
    }
}

impl std::fmt::Display for StyleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable style-to-modifier table.
///
/// Built once at startup and shared behind an `Arc`. Every [`StyleKey`] has an
/// entry; lookups with unknown keys resolve to the default style.
#[derive(Debug, Clone)]
pub struct StyleTable {
    modifiers: BTreeMap<StyleKey, String>,
    default_style: StyleKey,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StyleTable {
    /// The table shipped with the service.
    pub fn builtin() -> Self {
        let modifiers = StyleKey::ALL
            .into_iter()
            .map(|key| (key, key.builtin_modifier().to_string()))
            .collect();
        Self {
            modifiers,
            default_style: StyleKey::default(),
        }
    }

    /// Returns the style used for unknown keys.
    pub fn default_style(&self) -> StyleKey {
        self.default_style
    }

    /// Resolves a wire key to a style, falling back to the default.
    pub fn resolve_key(&self, key: &str) -> StyleKey {
        match StyleKey::parse(key.trim()) {
            Some(style) => style,
            None => {
                tracing::debug!(style = key, fallback = %self.default_style, "unknown style key");
                self.default_style
            }
        }
    }

    /// Returns the modifier for a wire key, falling back to the default style.
    pub fn modifier(&self, key: &str) -> &str {
        self.modifier_for(self.resolve_key(key))
    }

    /// Returns the modifier for a known style.
    pub fn modifier_for(&self, style: StyleKey) -> &str {
        self.modifiers
            .get(&style)
            .or_else(|| self.modifiers.get(&self.default_style))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Builds the enhanced prompt: `"<prompt>, <modifier>"`.
    pub fn enhance(&self, prompt: &str, key: &str) -> String {
        format!("{}, {}", prompt.trim(), self.modifier(key))
    }

    /// Iterates over styles and their modifiers in display order.
    pub fn iter(&self) -> impl Iterator<Item = (StyleKey, &str)> {
        StyleKey::ALL
            .into_iter()
            .map(move |key| (key, self.modifier_for(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_resolves() {
        let table = StyleTable::builtin();
        for key in StyleKey::ALL {
            assert!(!table.modifier(key.as_str()).is_empty(), "{key}");
            assert_eq!(table.resolve_key(key.as_str()), key);
        }
    }

    #[test]
    fn test_unknown_key_falls_back_to_default() {
        let table = StyleTable::builtin();
        assert_eq!(table.resolve_key("vaporwave"), StyleKey::Realistic);
        assert_eq!(
            table.modifier("vaporwave"),
            "photorealistic, highly detailed, professional photography"
        );
        assert_eq!(table.modifier(""), table.modifier("realistic"));
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let table = StyleTable::builtin();
        assert_eq!(table.modifier("sketch"), table.modifier("sketch"));
        assert_eq!(table.modifier("nope"), table.modifier("nope"));
    }

    #[test]
    fn test_enhance_appends_modifier() {
        let table = StyleTable::builtin();
        let enhanced = table.enhance("a red fox in snow", "anime");
        assert_eq!(
            enhanced,
            "a red fox in snow, anime style, manga art, Japanese animation style"
        );
    }

    #[test]
    fn test_parse_is_exact() {
        assert_eq!(StyleKey::parse("oil-painting"), Some(StyleKey::OilPainting));
        assert_eq!(StyleKey::parse("Oil Painting"), None);
        assert_eq!(StyleKey::parse("ANIME"), None);
    }

    #[test]
    fn test_serde_uses_wire_keys() {
        let json = serde_json::to_string(&StyleKey::DigitalArt).unwrap();
        assert_eq!(json, "\"digital-art\"");
        let back: StyleKey = serde_json::from_str("\"pencil-art\"").unwrap();
        assert_eq!(back, StyleKey::PencilArt);
    }

    #[test]
    fn test_labels() {
        assert_eq!(StyleKey::OilPainting.label(), "Oil Painting");
        assert_eq!(StyleKey::DigitalArt.to_string(), "digital-art");
    }
}
