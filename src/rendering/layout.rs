/// Callout geometry for a single annotation.
///
/// Everything in this module is pure: the same annotation, canvas size and
/// font metrics always produce the same box, line breaks and pointer shapes.
/// Placement is a fixed offset from the anchor clamped to the canvas edges;
/// other annotations are never considered.

use crate::annotation::{Annotation, AnnotationKind};
use crate::rendering::font::FontMetrics;
use crate::rendering::paint::Color;
use crate::Viewport;

/// Card width, also the wrap budget before padding is removed
pub const BOX_WIDTH: f32 = 150.0;
pub const HEADER_HEIGHT: f32 = 24.0;
pub const PADDING: f32 = 12.0;
pub const LINE_HEIGHT: f32 = 18.0;
pub const CORNER_RADIUS: f32 = 8.0;
pub const BOX_OFFSET_X: f32 = 160.0;
pub const BOX_OFFSET_Y: f32 = 100.0;
pub const EDGE_MARGIN: f32 = 10.0;
pub const TAIL_SIZE: f32 = 10.0;
pub const ANCHOR_RADIUS: f32 = 12.0;
pub const FONT_SIZE: f32 = 14.0;
/// Header label baseline, measured from the card top
pub const LABEL_BASELINE: f32 = 17.0;
/// Extra drop of the first body baseline below the padded header
pub const BODY_BASELINE_NUDGE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn bottom_center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.bottom())
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }
}

/// Colors and icon for one annotation kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalloutStyle {
    pub accent: Color,
    pub tint: Color,
    pub text: Color,
    pub icon: &'static str,
}

pub fn style_for(kind: AnnotationKind) -> CalloutStyle {
    match kind {
        AnnotationKind::Error => CalloutStyle {
            accent: Color::rgb(0xFF, 0x2D, 0x2D),
            tint: Color::rgba(255, 45, 45, 0.15),
            text: Color::rgb(0x9C, 0x00, 0x00),
            icon: "\u{2757}",
        },
        AnnotationKind::Warning => CalloutStyle {
            accent: Color::rgb(0xFF, 0x95, 0x00),
            tint: Color::rgba(255, 149, 0, 0.15),
            text: Color::rgb(0x98, 0x57, 0x00),
            icon: "\u{26A0}\u{FE0F}",
        },
        AnnotationKind::Suggestion => CalloutStyle {
            accent: Color::rgb(0x2D, 0x7F, 0xFF),
            tint: Color::rgba(45, 127, 255, 0.15),
            text: Color::rgb(0x00, 0x40, 0x9C),
            icon: "\u{1F53C}",
        },
    }
}

/// Greedy word wrap on single spaces.
///
/// A word is appended while `line + word + " "` still measures within
/// `max_width`; otherwise the current line is emitted and the word starts the
/// next one. This also applies to the first word, so a first word wider than
/// `max_width` is preceded by an empty line. Always returns at least one
/// (possibly empty) line.
pub fn wrap_text(text: &str, max_width: f32, size: f32, metrics: &dyn FontMetrics) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split(' ') {
        let candidate = format!("{}{} ", line, word);
        if metrics.measure(&candidate, size) > max_width {
            lines.push(line.trim_end().to_string());
            line = format!("{} ", word);
        } else {
            line = candidate;
        }
    }
    lines.push(line.trim_end().to_string());
    lines
}

/// One wrapped body line and its baseline origin
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub origin: Point,
    pub text: String,
}

/// Everything needed to paint one callout
#[derive(Debug, Clone, PartialEq)]
pub struct CalloutLayout {
    pub anchor: Point,
    pub card: Rect,
    pub header: Rect,
    /// From the anchor to the card's bottom-center
    pub connector: (Point, Point),
    /// Downward triangle under the card: left, tip, right
    pub tail: [Point; 3],
    pub label: String,
    pub label_origin: Point,
    pub lines: Vec<TextLine>,
    pub style: CalloutStyle,
}

impl CalloutLayout {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Compute the callout for `annotation` on a canvas of `width` x `height`
/// logical units.
pub fn layout_callout(
    annotation: &Annotation,
    width: f32,
    height: f32,
    metrics: &dyn FontMetrics,
) -> CalloutLayout {
    let style = style_for(annotation.kind);
    let wrapped = wrap_text(&annotation.text, BOX_WIDTH - PADDING * 2.0, FONT_SIZE, metrics);

    let body_height = wrapped.len() as f32 * LINE_HEIGHT;
    let box_height = HEADER_HEIGHT + body_height + PADDING * 2.0;

    let x = (annotation.x - BOX_OFFSET_X)
        .min(width - BOX_WIDTH - EDGE_MARGIN)
        .max(EDGE_MARGIN);
    let y = (annotation.y - BOX_OFFSET_Y)
        .min(height - box_height - EDGE_MARGIN)
        .max(EDGE_MARGIN);

    let card = Rect {
        x,
        y,
        width: BOX_WIDTH,
        height: box_height,
    };
    let header = Rect {
        height: HEADER_HEIGHT,
        ..card
    };
    let anchor = Point::new(annotation.x, annotation.y);
    let foot = card.bottom_center();

    let first_baseline = y + HEADER_HEIGHT + PADDING + BODY_BASELINE_NUDGE;
    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(i, text)| TextLine {
            origin: Point::new(x + PADDING, first_baseline + i as f32 * LINE_HEIGHT),
            text,
        })
        .collect();

    CalloutLayout {
        anchor,
        card,
        header,
        connector: (anchor, foot),
        tail: [
            Point::new(foot.x - TAIL_SIZE, foot.y),
            Point::new(foot.x, foot.y + TAIL_SIZE),
            Point::new(foot.x + TAIL_SIZE, foot.y),
        ],
        label: format!("{} {}", style.icon, annotation.kind.label()),
        label_origin: Point::new(x + PADDING, y + LABEL_BASELINE),
        lines,
        style,
    }
}

/// Fit the image's natural aspect ratio inside the requested box.
///
/// Wider-than-image boxes keep the requested height, otherwise the requested
/// width is kept. Fractional results are truncated like a canvas size
/// assignment; both sides are at least one pixel.
pub fn fit_to_aspect(requested: Viewport, natural_width: u32, natural_height: u32) -> (u32, u32) {
    if natural_width == 0 || natural_height == 0 {
        return (requested.width.max(1), requested.height.max(1));
    }
    let w = requested.width as f64;
    let h = requested.height as f64;
    let aspect = natural_width as f64 / natural_height as f64;
    let (fw, fh) = if w / h > aspect {
        (h * aspect, h)
    } else {
        (w, w / aspect)
    };
    ((fw.floor() as u32).max(1), (fh.floor() as u32).max(1))
}
