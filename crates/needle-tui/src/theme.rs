//! Colours for the meter faces and the surrounding chrome.

use ratatui::style::{Color, Modifier, Style};

use needle_core::config::DisplayConfig;

use crate::components::meter_face::Ink;

// ── Chrome palette ────────────────────────────────────────────────────────────

pub const C_BG: Color = Color::Rgb(18, 18, 18);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_ACCENT: Color = Color::Rgb(255, 184, 80);
pub const C_KEY_HINT: Color = Color::Rgb(90, 90, 115);

pub fn style_title() -> Style {
    Style::default()
        .fg(C_ACCENT)
        .bg(C_BG)
        .add_modifier(Modifier::BOLD)
}

pub fn style_secondary() -> Style {
    Style::default().fg(C_SECONDARY).bg(C_BG)
}

pub fn style_key_hint() -> Style {
    Style::default().fg(C_KEY_HINT).bg(C_BG)
}

pub fn style_default() -> Style {
    Style::default().fg(C_PRIMARY).bg(C_BG)
}

// ── Meter face ────────────────────────────────────────────────────────────────

/// 0xRRGGBB → terminal colour.
pub fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

/// Linear blend between two 0xRRGGBB colours, `t` clamped to 0..=1.
pub fn lerp_rgb(from: u32, to: u32, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let channel = |shift: u32| {
        let a = ((from >> shift) & 0xFF) as f32;
        let b = ((to >> shift) & 0xFF) as f32;
        (a + (b - a) * t).round() as u8
    };
    Color::Rgb(channel(16), channel(8), channel(0))
}

/// Resolved face colours.
#[derive(Debug, Clone)]
pub struct Theme {
    face_top: u32,
    face_bottom: u32,
    pub scale: Color,
    pub peak: Color,
    pub needle: Color,
}

impl Theme {
    pub fn from_display(display: &DisplayConfig) -> Self {
        Self {
            face_top: display.face_top,
            face_bottom: display.face_bottom,
            scale: rgb(display.scale),
            peak: rgb(display.peak),
            needle: rgb(display.needle),
        }
    }

    /// Face background `t` of the way from top (0) to bottom (1).
    pub fn face_at(&self, t: f32) -> Color {
        lerp_rgb(self.face_top, self.face_bottom, t)
    }

    pub fn ink(&self, ink: Ink) -> Color {
        match ink {
            Ink::Scale => self.scale,
            Ink::Peak => self.peak,
        }
    }
}
