//! Colors for the interactive view, selected by the `[ui] theme` setting.

use ratatui::style::Color;

/// A color theme for the interactive view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Title and current-block accent
    pub primary: Color,
    /// Command text
    pub secondary: Color,
    /// Execute-many count
    pub accent: Color,
    pub text: Color,
    /// Descriptions
    pub text_dim: Color,
    /// Hints and pending blocks
    pub text_muted: Color,
    pub border: Color,
    pub success: Color,
    /// Running indicator
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color::Rgb(56, 189, 248),
            secondary: Color::Rgb(226, 232, 240),
            accent: Color::Rgb(250, 204, 21),
            text: Color::Rgb(241, 245, 249),
            text_dim: Color::Rgb(148, 163, 184),
            text_muted: Color::Rgb(100, 116, 139),
            border: Color::Rgb(71, 85, 105),
            success: Color::Rgb(74, 222, 128),
            warning: Color::Rgb(251, 191, 36),
            error: Color::Rgb(248, 113, 113),
        }
    }
}

impl Theme {
    /// Base palette only, for terminals without true color.
    pub fn high_contrast() -> Self {
        Self {
            primary: Color::Cyan,
            secondary: Color::White,
            accent: Color::Yellow,
            text: Color::White,
            text_dim: Color::Gray,
            text_muted: Color::DarkGray,
            border: Color::White,
            success: Color::LightGreen,
            warning: Color::LightYellow,
            error: Color::LightRed,
        }
    }

    /// Look a theme up by name, ignoring case.
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" => Some(Self::default()),
            "high-contrast" | "high_contrast" => Some(Self::high_contrast()),
            _ => None,
        }
    }
}
