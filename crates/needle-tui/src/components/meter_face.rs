//! Meter face: an analog needle gauge drawn on a braille canvas.
//!
//! Geometry is expressed in units of the face width `W`, with y pointing
//! down from the top edge as on a real dial; the face is `W/2` tall. Only
//! the final canvas calls flip y.
//!
//! Layout:
//! - 7-segment ruler at `y = W/8`: first block in scale ink, five ruled
//!   segments with major and minor ticks, last block in peak ink
//! - pivot window at `(5W/16, 3W/8)`, `6W/16 × W/16`
//! - needle swept ±45° about a pivot below the window

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    text::Span,
    widgets::canvas::{Canvas, Context, Line as CanvasLine, Rectangle},
    Frame,
};

use needle_core::Channel;

use crate::theme::Theme;

// ═════════════════════════════════════════════════════════════════════════════
// GEOMETRY
// ═════════════════════════════════════════════════════════════════════════════

/// Face height as a fraction of its width.
pub const HEIGHT_RATIO: f64 = 0.5;

/// Number of ruler segments, including the two solid end blocks.
const RULER_SEGMENTS: usize = 7;

/// Minor ticks are only drawn when a segment is at least this many dots wide.
const MINOR_TICK_MIN_DOTS: f64 = 12.0;

/// A straight stroke in face coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// An axis-aligned box in face coordinates (`y` is the top edge).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Which face colour a piece of the ruler uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    Scale,
    Peak,
}

/// Needle angle from vertical for a deflection: 0 → −45°, 1 → +45°.
pub fn needle_angle(deflection: f32) -> f64 {
    deflection as f64 * FRAC_PI_2 - FRAC_PI_4
}

/// Dial geometry for a face `width` units wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceGeometry {
    pub width: f64,
}

impl FaceGeometry {
    pub const UNIT: FaceGeometry = FaceGeometry { width: 1.0 };

    pub fn height(&self) -> f64 {
        self.width * HEIGHT_RATIO
    }

    /// Needle from its tip near the ruler down to where it disappears behind
    /// the pivot window. The face is a 0..1 scale, so deflection is pegged
    /// there.
    pub fn needle(&self, deflection: f32) -> Segment {
        let w = self.width;
        let angle = needle_angle(deflection.clamp(0.0, 1.0));
        Segment {
            x1: w / 2.0 + w * 8.0 / 16.0 * angle.sin(),
            y1: w * 9.0 / 16.0 - w * 8.0 / 16.0 * angle.cos(),
            x2: w / 2.0 + w * 3.0 / 16.0 * angle.tan(),
            y2: w * 3.0 / 8.0,
        }
    }

    pub fn pivot_window(&self) -> Block {
        let w = self.width;
        Block {
            x: w * 5.0 / 16.0,
            y: w * 3.0 / 8.0,
            width: w * 6.0 / 16.0,
            height: w / 16.0,
        }
    }

    /// The ruler's outer box.
    pub fn ruler(&self) -> Block {
        let w = self.width;
        Block {
            x: w / 16.0,
            y: w / 8.0,
            width: w * 14.0 / 16.0,
            height: w / 16.0,
        }
    }

    pub fn segment_width(&self) -> f64 {
        self.ruler().width / RULER_SEGMENTS as f64
    }

    /// Solid first and last segments.
    pub fn end_blocks(&self) -> [(Block, Ink); 2] {
        let r = self.ruler();
        let seg = self.segment_width();
        [
            (
                Block {
                    width: seg,
                    ..r
                },
                Ink::Scale,
            ),
            (
                Block {
                    x: r.x + seg * (RULER_SEGMENTS - 1) as f64,
                    width: seg,
                    ..r
                },
                Ink::Peak,
            ),
        ]
    }

    /// Top rule, major tick and (optionally) five minor ticks for each of
    /// the ruled middle segments.
    pub fn ruler_strokes(&self, minor_ticks: bool) -> Vec<Segment> {
        let r = self.ruler();
        let seg = self.segment_width();
        let mut strokes = Vec::new();

        for i in 1..RULER_SEGMENTS - 1 {
            let n = r.x + seg * i as f64;
            strokes.push(Segment {
                x1: n,
                y1: r.y,
                x2: n + seg,
                y2: r.y,
            });
            strokes.push(Segment {
                x1: n,
                y1: r.y,
                x2: n,
                y2: r.y + r.height,
            });
            if minor_ticks {
                for v in 1..6 {
                    let x = n + seg * v as f64 / 6.0;
                    strokes.push(Segment {
                        x1: x,
                        y1: r.y,
                        x2: x,
                        y2: r.y + r.height / 2.0,
                    });
                }
            }
        }

        strokes
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// DRAWING
// ═════════════════════════════════════════════════════════════════════════════

/// Draws one channel's dial.
pub struct MeterFace {
    channel: Channel,
    geometry: FaceGeometry,
}

impl MeterFace {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            geometry: FaceGeometry::UNIT,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect, deflection: f32, theme: &Theme) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let g = self.geometry;
        let height = g.height();
        // Braille cells are 2×4 dots.
        let dots_x = area.width as f64 * 2.0;
        let dots_y = area.height as f64 * 4.0;
        let minor_ticks = g.segment_width() / g.width * dots_x >= MINOR_TICK_MIN_DOTS;
        let fill_step = height / dots_y;
        let label = self.channel.label();

        let canvas = Canvas::default()
            .marker(Marker::Braille)
            .x_bounds([0.0, g.width])
            .y_bounds([0.0, height])
            .paint(|ctx| {
                for (block, ink) in g.end_blocks() {
                    fill_block(ctx, block, height, fill_step, theme.ink(ink));
                }
                for s in g.ruler_strokes(minor_ticks) {
                    stroke(ctx, s, height, theme.scale);
                }

                let window = g.pivot_window();
                ctx.draw(&Rectangle {
                    x: window.x,
                    y: height - window.y - window.height,
                    width: window.width,
                    height: window.height,
                    color: theme.scale,
                });

                stroke(ctx, g.needle(deflection), height, theme.needle);

                ctx.print(
                    g.width / 32.0,
                    height / 8.0,
                    Span::styled(label, Style::default().fg(theme.scale)),
                );
            });

        frame.render_widget(canvas, area);

        // The canvas resets the background, so lay the gradient on afterwards.
        let buf = frame.buffer_mut();
        for row in 0..area.height {
            let t = if area.height > 1 {
                row as f32 / (area.height - 1) as f32
            } else {
                0.0
            };
            let line = Rect::new(area.x, area.y + row, area.width, 1);
            buf.set_style(line, Style::default().bg(theme.face_at(t)));
        }
    }
}

/// Draw `s` with y flipped into canvas space.
fn stroke(ctx: &mut Context, s: Segment, height: f64, color: Color) {
    ctx.draw(&CanvasLine {
        x1: s.x1,
        y1: height - s.y1,
        x2: s.x2,
        y2: height - s.y2,
        color,
    });
}

/// Fill a block with horizontal lines one dot row apart.
fn fill_block(ctx: &mut Context, b: Block, height: f64, step: f64, color: Color) {
    let mut y = b.y;
    while y <= b.y + b.height {
        stroke(
            ctx,
            Segment {
                x1: b.x,
                y1: y,
                x2: b.x + b.width,
                y2: y,
            },
            height,
            color,
        );
        y += step;
    }
}
