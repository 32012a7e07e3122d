//! Theme descriptor types.
//!
//! The derived UI mood artifact is always one of two explicit shapes: a
//! structured color palette or a single mood label. Exactly one variant is
//! active per deployment; the wire format stays what clients expect (an
//! object for palettes, a bare string for categories).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Structured color palette generated from conversation mood.
///
/// Field names are camelCase on the wire, matching the frontend theme
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemePalette {
    /// Palette identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Primary color (hex).
    pub primary_color: String,
    /// Secondary color (hex).
    pub secondary_color: String,
    /// Page background color (hex).
    pub background_color: String,
    /// Body text color (hex).
    pub text_color: String,
    /// Accent color (hex).
    pub accent_color: String,
    /// Gradient start color (hex).
    pub gradient_start: String,
    /// Gradient end color (hex).
    pub gradient_end: String,
    /// User message bubble background (hex).
    pub message_user_bg: String,
    /// Assistant message bubble background (hex).
    pub message_assistant_bg: String,
    /// Border color (hex).
    pub border_color: String,
    /// Shadow color (rgba).
    pub shadow_color: String,
    /// Emoji icon.
    pub icon: String,
}

/// Fixed set of mood labels for the category deployment profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeCategory {
    /// Love and affection.
    Romance,
    /// Exploration and excitement.
    Adventure,
    /// Suspense and intrigue.
    Mystery,
    /// Work and formality.
    Professional,
    /// Light-hearted fun.
    Playful,
    /// Quiet and relaxed.
    Calm,
    /// High energy.
    Energetic,
    /// Sadness and reflection.
    Melancholic,
    /// Uplifting and motivating.
    Inspiring,
    /// Warm and comfortable.
    Cozy,
    /// Intense and theatrical.
    Dramatic,
    /// Imaginative and otherworldly.
    Fantasy,
}

impl ThemeCategory {
    /// All categories, in prompt order.
    pub const ALL: [Self; 12] = [
        Self::Romance,
        Self::Adventure,
        Self::Mystery,
        Self::Professional,
        Self::Playful,
        Self::Calm,
        Self::Energetic,
        Self::Melancholic,
        Self::Inspiring,
        Self::Cozy,
        Self::Dramatic,
        Self::Fantasy,
    ];

    /// Lowercase label used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Romance => "romance",
            Self::Adventure => "adventure",
            Self::Mystery => "mystery",
            Self::Professional => "professional",
            Self::Playful => "playful",
            Self::Calm => "calm",
            Self::Energetic => "energetic",
            Self::Melancholic => "melancholic",
            Self::Inspiring => "inspiring",
            Self::Cozy => "cozy",
            Self::Dramatic => "dramatic",
            Self::Fantasy => "fantasy",
        }
    }

    /// Parse an already-normalized (trimmed, lowercased) label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == label)
    }
}

impl Default for ThemeCategory {
    fn default() -> Self {
        Self::Calm
    }
}

impl fmt::Display for ThemeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or(())
    }
}

/// The derived UI mood artifact.
///
/// Untagged on the wire: a palette serializes as an object, a category as
/// a bare string, so the two are never ambiguous at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeDescriptor {
    /// Structured palette profile.
    Palette(ThemePalette),
    /// Mood label profile.
    Category(ThemeCategory),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_palette() -> ThemePalette {
        ThemePalette {
            id: "mood_theme".to_string(),
            name: "Dusk".to_string(),
            primary_color: "#aa00aa".to_string(),
            secondary_color: "#bb00bb".to_string(),
            background_color: "#101010".to_string(),
            text_color: "#f0f0f0".to_string(),
            accent_color: "#ff8800".to_string(),
            gradient_start: "#000000".to_string(),
            gradient_end: "#333333".to_string(),
            message_user_bg: "#222222".to_string(),
            message_assistant_bg: "#111111".to_string(),
            border_color: "#444444".to_string(),
            shadow_color: "rgba(0,0,0,0.3)".to_string(),
            icon: "🌆".to_string(),
        }
    }

    #[test]
    fn test_palette_wire_format_is_camel_case() {
        let json = serde_json::to_value(ThemeDescriptor::Palette(sample_palette())).unwrap();
        assert_eq!(json["primaryColor"], "#aa00aa");
        assert_eq!(json["messageUserBg"], "#222222");
        assert_eq!(json["icon"], "🌆");
    }

    #[test]
    fn test_category_wire_format_is_bare_string() {
        let json = serde_json::to_string(&ThemeDescriptor::Category(ThemeCategory::Cozy)).unwrap();
        assert_eq!(json, "\"cozy\"");
    }

    #[test]
    fn test_descriptor_read_back_is_unambiguous() {
        let palette: ThemeDescriptor =
            serde_json::from_value(serde_json::to_value(sample_palette()).unwrap()).unwrap();
        assert!(matches!(palette, ThemeDescriptor::Palette(_)));

        let category: ThemeDescriptor = serde_json::from_str("\"romance\"").unwrap();
        assert_eq!(category, ThemeDescriptor::Category(ThemeCategory::Romance));
    }

    #[test]
    fn test_category_labels_round_trip() {
        for category in ThemeCategory::ALL {
            assert_eq!(ThemeCategory::from_label(category.as_str()), Some(category));
        }
        assert_eq!(ThemeCategory::from_label("bogus"), None);
    }
}
