/// Pointer clicks on the rendered surface turned into new annotations.
///
/// Click positions are translated by subtracting the surface's on-screen
/// origin only. No scale or device-pixel-ratio correction is applied, so the
/// surface must be displayed at its intrinsic size for clicks to land where
/// the user pointed.

use crate::annotation::{next_id, Annotation, AnnotationKind};
use crate::rendering::layout::Point;

pub const DEFAULT_TEXT: &str = "New annotation";
pub const DEFAULT_KIND: AnnotationKind = AnnotationKind::Suggestion;

/// Raw pointer position in display (client) space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub client_x: f32,
    pub client_y: f32,
}

/// On-screen bounding box of the rendered surface element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    /// A rect displayed at exactly the surface's logical size
    pub fn unscaled(left: f32, top: f32, logical: (u32, u32)) -> Self {
        Self {
            left,
            top,
            width: logical.0 as f32,
            height: logical.1 as f32,
        }
    }

    pub fn matches_logical(&self, logical: (u32, u32)) -> bool {
        (self.width - logical.0 as f32).abs() < 0.5 && (self.height - logical.1 as f32).abs() < 0.5
    }
}

pub fn to_surface_point(event: PointerEvent, rect: SurfaceRect) -> Point {
    Point::new(event.client_x - rect.left, event.client_y - rect.top)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionAdapter {
    editable: bool,
}

impl InteractionAdapter {
    pub fn new(editable: bool) -> Self {
        Self { editable }
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    /// Build the annotation a click creates, or `None` when read-only.
    ///
    /// `logical` is the surface's own pixel size; a mismatch with the rect is
    /// only logged.
    pub fn handle_click(
        &self,
        event: PointerEvent,
        rect: SurfaceRect,
        logical: (u32, u32),
    ) -> Option<Annotation> {
        if !self.editable {
            return None;
        }
        if !rect.matches_logical(logical) {
            log::warn!(
                "surface displayed at {}x{} but is {}x{}; click position is not scale-corrected",
                rect.width,
                rect.height,
                logical.0,
                logical.1
            );
        }
        let p = to_surface_point(event, rect);
        Some(Annotation::new(next_id("anno"), p.x, p.y, DEFAULT_TEXT, DEFAULT_KIND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_subtracts_origin() {
        let p = to_surface_point(
            PointerEvent { client_x: 150.0, client_y: 90.0 },
            SurfaceRect::unscaled(50.0, 40.0, (800, 600)),
        );
        assert_eq!(p, Point::new(100.0, 50.0));
    }

    #[test]
    fn read_only_surface_ignores_clicks() {
        let adapter = InteractionAdapter::new(false);
        let rect = SurfaceRect::unscaled(0.0, 0.0, (800, 600));
        assert!(adapter
            .handle_click(PointerEvent { client_x: 1.0, client_y: 1.0 }, rect, (800, 600))
            .is_none());
    }

    #[test]
    fn click_creates_default_suggestion() {
        let adapter = InteractionAdapter::new(true);
        let rect = SurfaceRect::unscaled(10.0, 20.0, (800, 600));
        let a = adapter
            .handle_click(PointerEvent { client_x: 110.0, client_y: 220.0 }, rect, (800, 600))
            .unwrap();
        assert_eq!((a.x, a.y), (100.0, 200.0));
        assert_eq!(a.kind, AnnotationKind::Suggestion);
        assert_eq!(a.text, "New annotation");
        assert!(a.id.starts_with("anno-"));
    }
}
