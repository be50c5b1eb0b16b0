//! Title and footer lines around the meters.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{style_default, style_key_hint, style_secondary, style_title};

const KEYS: &[(&str, &str)] = &[("q", "quit"), ("esc", "quit"), ("^c", "quit")];

/// Program name and version, left-aligned.
pub fn draw_title(frame: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" needle ", style_title()),
        Span::styled(concat!("v", env!("CARGO_PKG_VERSION")), style_secondary()),
    ]);
    frame.render_widget(Paragraph::new(line).style(style_default()), area);
}

/// Input source on the left, key help after it.
pub fn draw_footer(frame: &mut Frame, area: Rect, source: &str) {
    frame.render_widget(
        Paragraph::new(footer_line(source)).style(style_default()),
        area,
    );
}

fn footer_line(source: &str) -> Line<'_> {
    let mut spans = vec![
        Span::styled(" ", style_default()),
        Span::styled(source, style_default()),
        Span::styled("  │ ", style_secondary()),
    ];
    for (i, (key, what)) in KEYS.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  ", style_secondary()));
        }
        spans.push(Span::styled(*key, style_key_hint()));
        spans.push(Span::styled(" ", style_secondary()));
        spans.push(Span::styled(*what, style_secondary()));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_names_source_and_keys() {
        let line = footer_line("demo signal");
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.contains("demo signal"));
        assert!(text.contains("q quit"));
        assert!(text.contains("esc quit"));
    }
}
