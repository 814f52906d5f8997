/// Paint command set: the display list the compositor hands to the raster
/// surface. Commands are executed strictly in order, each composited over
/// what is already on the surface.

use crate::rendering::layout::{
    CalloutLayout, Point, Rect, ANCHOR_RADIUS, CORNER_RADIUS, FONT_SIZE,
};
use image::RgbaImage;
use std::fmt;
use std::sync::Arc;

pub const CONNECTOR_WIDTH: f32 = 3.0;
pub const OUTLINE_WIDTH: f32 = 2.0;
pub const ANCHOR_ALPHA: f32 = 0.9;

/// sRGB color with a fractional alpha, as written in CSS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const BODY_TEXT: Color = Color::rgb(0x33, 0x33, 0x33);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn alpha_u8(&self) -> u8 {
        (self.a.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    /// `#RRGGBB` for opaque colors, `rgba(r,g,b,a)` otherwise
    pub fn to_css(&self) -> String {
        if self.a >= 1.0 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("rgba({},{},{},{})", self.r, self.g, self.b, self.a)
        }
    }
}

/// Decoded base image already scaled to the surface size.
#[derive(Clone, PartialEq)]
pub struct BaseImage(pub Arc<RgbaImage>);

impl BaseImage {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }
}

impl fmt::Debug for BaseImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BaseImage({}x{})", self.width(), self.height())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Color,
    pub blur: f32,
    pub offset: Point,
}

impl Shadow {
    pub const CARD: Shadow = Shadow {
        color: Color::rgba(0, 0, 0, 0.35),
        blur: 8.0,
        offset: Point::new(2.0, 2.0),
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    /// Reset every pixel to transparent
    Clear,
    /// Draw the base image stretched over the whole surface
    Image(BaseImage),
    FillRect {
        rect: Rect,
        color: Color,
    },
    Line {
        from: Point,
        to: Point,
        width: f32,
        color: Color,
    },
    Circle {
        center: Point,
        radius: f32,
        fill: Color,
        stroke: Color,
        stroke_width: f32,
    },
    RoundedRect {
        rect: Rect,
        radius: f32,
        fill: Color,
        stroke: Color,
        stroke_width: f32,
        shadow: Option<Shadow>,
    },
    /// Rect with only the top corners rounded
    HeaderBand {
        rect: Rect,
        radius: f32,
        fill: Color,
    },
    /// Left-aligned text; `origin` is the start of the baseline
    Text {
        origin: Point,
        text: String,
        size: f32,
        bold: bool,
        color: Color,
    },
    Triangle {
        points: [Point; 3],
        fill: Color,
        stroke: Color,
        stroke_width: f32,
    },
}

/// Translate one callout layout into paint commands, back to front:
/// connector, anchor, card, header band, label, body lines, tail.
pub fn callout_commands(layout: &CalloutLayout) -> Vec<PaintCommand> {
    let style = &layout.style;
    let mut cmds = Vec::with_capacity(6 + layout.lines.len());

    cmds.push(PaintCommand::Line {
        from: layout.connector.0,
        to: layout.connector.1,
        width: CONNECTOR_WIDTH,
        color: style.accent,
    });
    cmds.push(PaintCommand::Circle {
        center: layout.anchor,
        radius: ANCHOR_RADIUS,
        fill: style.accent.with_alpha(ANCHOR_ALPHA),
        stroke: Color::WHITE,
        stroke_width: OUTLINE_WIDTH,
    });
    cmds.push(PaintCommand::RoundedRect {
        rect: layout.card,
        radius: CORNER_RADIUS,
        fill: Color::WHITE.with_alpha(0.95),
        stroke: style.accent,
        stroke_width: OUTLINE_WIDTH,
        shadow: Some(Shadow::CARD),
    });
    cmds.push(PaintCommand::HeaderBand {
        rect: layout.header,
        radius: CORNER_RADIUS,
        fill: style.tint,
    });
    cmds.push(PaintCommand::Text {
        origin: layout.label_origin,
        text: layout.label.clone(),
        size: FONT_SIZE,
        bold: true,
        color: style.text,
    });
    for line in &layout.lines {
        cmds.push(PaintCommand::Text {
            origin: line.origin,
            text: line.text.clone(),
            size: FONT_SIZE,
            bold: false,
            color: Color::BODY_TEXT,
        });
    }
    cmds.push(PaintCommand::Triangle {
        points: layout.tail,
        fill: Color::WHITE,
        stroke: style.accent,
        stroke_width: OUTLINE_WIDTH,
    });
    cmds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, AnnotationKind};
    use crate::rendering::font::BitmapFont;
    use crate::rendering::layout::layout_callout;

    #[test]
    fn callout_paints_in_back_to_front_order() {
        let a = Annotation::new("a1", 400.0, 300.0, "aaaaaaaaaa bbbbbbbbbb", AnnotationKind::Error);
        let layout = layout_callout(&a, 800.0, 600.0, &BitmapFont::new());
        let cmds = callout_commands(&layout);
        let kinds: Vec<&str> = cmds
            .iter()
            .map(|c| match c {
                PaintCommand::Line { .. } => "line",
                PaintCommand::Circle { .. } => "anchor",
                PaintCommand::RoundedRect { .. } => "card",
                PaintCommand::HeaderBand { .. } => "header",
                PaintCommand::Text { bold: true, .. } => "label",
                PaintCommand::Text { .. } => "body",
                PaintCommand::Triangle { .. } => "tail",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, ["line", "anchor", "card", "header", "label", "body", "body", "tail"]);
    }

    #[test]
    fn anchor_is_translucent_accent_with_white_outline() {
        let a = Annotation::new("a1", 50.0, 50.0, "", AnnotationKind::Suggestion);
        let layout = layout_callout(&a, 800.0, 600.0, &BitmapFont::new());
        match &callout_commands(&layout)[1] {
            PaintCommand::Circle { radius, fill, stroke, stroke_width, .. } => {
                assert_eq!(*radius, 12.0);
                assert_eq!(fill.to_css(), "rgba(45,127,255,0.9)");
                assert_eq!(*stroke, Color::WHITE);
                assert_eq!(*stroke_width, 2.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn color_css_forms() {
        assert_eq!(Color::rgb(0x33, 0x33, 0x33).to_css(), "#333333");
        assert_eq!(Color::rgba(0, 0, 0, 0.1).to_css(), "rgba(0,0,0,0.1)");
        assert_eq!(Color::rgba(0, 0, 0, 0.35).alpha_u8(), 89);
    }
}
