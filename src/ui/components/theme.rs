//! Colours and styles for the terminal front end.
//!
//! Two palettes (dark, light) share a small set of named colours. Chart bars
//! take their hue from the upload-year palette and are dimmed by the bar's
//! brightness percentage, the way a CSS `brightness()` filter would.

use ratatui::style::{Color, Modifier, Style};

use crate::chart::PALETTE;

pub mod colors {
    use ratatui::style::Color;

    // Base
    pub const BG_DEEP: Color = Color::Rgb(26, 27, 38); // #1a1b26
    pub const BG_SURFACE: Color = Color::Rgb(36, 40, 59); // #24283b
    pub const BG_HIGHLIGHT: Color = Color::Rgb(41, 46, 66); // #292e42
    pub const BORDER: Color = Color::Rgb(59, 66, 97); // #3b4261
    pub const BORDER_FOCUS: Color = Color::Rgb(125, 145, 200); // #7d91c8

    // Text
    pub const TEXT_PRIMARY: Color = Color::Rgb(192, 202, 245); // #c0caf5
    pub const TEXT_SECONDARY: Color = Color::Rgb(169, 177, 214); // #a9b1d6
    pub const TEXT_MUTED: Color = Color::Rgb(105, 114, 158); // #696e9e

    // Accents
    pub const ACCENT_PRIMARY: Color = Color::Rgb(122, 162, 247); // #7aa2f7
    pub const ACCENT_SECONDARY: Color = Color::Rgb(187, 154, 247); // #bb9af7

    pub const STATUS_ERROR: Color = Color::Rgb(247, 118, 142); // #f7768e
}

/// RGB of each chart palette entry, in [`PALETTE`] order.
const BAR_RGB: [(u8, u8, u8); 4] = [
    (220, 20, 60),   // Crimson
    (173, 255, 47),  // GreenYellow
    (255, 215, 0),   // Gold
    (123, 104, 238), // MediumSlateBlue
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemePalette {
    pub accent: Color,
    pub accent_alt: Color,
    pub bg: Color,
    pub fg: Color,
    pub surface: Color,
    pub hint: Color,
    pub border: Color,
    pub error: Color,
}

impl ThemePalette {
    pub fn light() -> Self {
        Self {
            accent: Color::Rgb(47, 107, 231),
            accent_alt: Color::Rgb(124, 93, 198),
            bg: Color::Rgb(250, 250, 252),
            fg: Color::Rgb(36, 41, 46),
            surface: Color::Rgb(240, 241, 245),
            hint: Color::Rgb(125, 134, 144),
            border: Color::Rgb(216, 222, 228),
            error: Color::Rgb(200, 40, 70),
        }
    }

    pub fn dark() -> Self {
        Self {
            accent: colors::ACCENT_PRIMARY,
            accent_alt: colors::ACCENT_SECONDARY,
            bg: colors::BG_DEEP,
            fg: colors::TEXT_PRIMARY,
            surface: colors::BG_SURFACE,
            hint: colors::TEXT_MUTED,
            border: colors::BORDER,
            error: colors::STATUS_ERROR,
        }
    }

    pub fn title(self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn hint_style(self) -> Style {
        Style::default().fg(self.hint)
    }

    pub fn border_style(self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn border_focus_style(self) -> Style {
        Style::default().fg(colors::BORDER_FOCUS)
    }

    /// Emphasized pattern match inside a row.
    pub fn highlight_style(self) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn selected_style(self) -> Style {
        Style::default()
            .bg(colors::BG_HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    /// Rows that have been opened at least once.
    pub fn visited_style(self) -> Style {
        Style::default()
            .fg(self.accent_alt)
            .add_modifier(Modifier::DIM)
    }

    pub fn error_style(self) -> Style {
        Style::default()
            .fg(self.error)
            .add_modifier(Modifier::BOLD)
    }

    pub fn header_style(self) -> Style {
        Style::default()
            .fg(colors::TEXT_SECONDARY)
            .bg(self.surface)
            .add_modifier(Modifier::BOLD)
    }

    /// Colour of a chart bar. Bars without a brightness (no matches) use the
    /// hint colour so they read as a baseline.
    pub fn bar_color(self, color_key: &str, brightness_percent: Option<f64>) -> Color {
        let Some(brightness) = brightness_percent else {
            return self.hint;
        };
        let (r, g, b) = PALETTE
            .iter()
            .position(|k| *k == color_key)
            .map(|i| BAR_RGB[i])
            .unwrap_or((128, 128, 128));
        let scale = |c: u8| ((c as f64) * brightness / 100.0).round().clamp(0.0, 255.0) as u8;
        Color::Rgb(scale(r), scale(g), scale(b))
    }
}

impl Default for ThemePalette {
    fn default() -> Self {
        Self::dark()
    }
}
