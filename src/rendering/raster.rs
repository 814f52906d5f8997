/// Raster surface backed by a `tiny_skia::Pixmap`.
///
/// The surface only knows how to execute [`PaintCommand`]s; it has no idea
/// what an annotation is. Pixels are stored premultiplied and demultiplied on
/// read-back and PNG encoding.

use crate::rendering::font::BitmapFont;
use crate::rendering::layout::{Point, Rect};
use crate::rendering::paint::{BaseImage, Color, PaintCommand, Shadow};
use crate::rendering::Screenshot;
use crate::{Error, Result};
use image::{imageops, RgbaImage};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Stroke,
    Transform,
};

pub struct Surface {
    pixmap: Pixmap,
    font: BitmapFont,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Surface({}x{})", self.width(), self.height())
    }
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            Error::RenderError(format!("cannot allocate {}x{} surface", width, height))
        })?;
        Ok(Self {
            pixmap,
            font: BitmapFont::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn execute_all(&mut self, commands: &[PaintCommand]) -> Result<()> {
        for cmd in commands {
            self.execute(cmd)?;
        }
        Ok(())
    }

    pub fn execute(&mut self, cmd: &PaintCommand) -> Result<()> {
        match cmd {
            PaintCommand::Clear => self.pixmap.fill(tiny_skia::Color::TRANSPARENT),
            PaintCommand::Image(img) => self.draw_image(img)?,
            PaintCommand::FillRect { rect, color } => {
                let r = skia_rect(rect)?;
                self.pixmap
                    .fill_rect(r, &solid(*color), Transform::identity(), None);
            }
            PaintCommand::Line {
                from,
                to,
                width,
                color,
            } => {
                let mut pb = PathBuilder::new();
                pb.move_to(from.x, from.y);
                pb.line_to(to.x, to.y);
                // A zero-length connector has nothing to stroke
                if let Some(path) = pb.finish() {
                    self.stroke(&path, *color, *width);
                }
            }
            PaintCommand::Circle {
                center,
                radius,
                fill,
                stroke,
                stroke_width,
            } => {
                let path = PathBuilder::from_circle(center.x, center.y, *radius).ok_or_else(|| {
                    Error::RenderError(format!("invalid circle radius {}", radius))
                })?;
                self.fill(&path, *fill);
                self.stroke(&path, *stroke, *stroke_width);
            }
            PaintCommand::RoundedRect {
                rect,
                radius,
                fill,
                stroke,
                stroke_width,
                shadow,
            } => {
                let path = rounded_rect_path(rect, *radius, true)?;
                if let Some(shadow) = shadow {
                    self.draw_shadow(&path, rect, shadow)?;
                }
                self.fill(&path, *fill);
                self.stroke(&path, *stroke, *stroke_width);
            }
            PaintCommand::HeaderBand { rect, radius, fill } => {
                let path = rounded_rect_path(rect, *radius, false)?;
                self.fill(&path, *fill);
            }
            PaintCommand::Text {
                origin,
                text,
                size,
                bold,
                color,
            } => self.draw_text(*origin, text, *size, *bold, *color),
            PaintCommand::Triangle {
                points,
                fill,
                stroke,
                stroke_width,
            } => {
                let mut pb = PathBuilder::new();
                pb.move_to(points[0].x, points[0].y);
                pb.line_to(points[1].x, points[1].y);
                pb.line_to(points[2].x, points[2].y);
                pb.close();
                let path = pb
                    .finish()
                    .ok_or_else(|| Error::RenderError("degenerate triangle".into()))?;
                self.fill(&path, *fill);
                self.stroke(&path, *stroke, *stroke_width);
            }
        }
        Ok(())
    }

    fn fill(&mut self, path: &Path, color: Color) {
        self.pixmap
            .fill_path(path, &solid(color), FillRule::Winding, Transform::identity(), None);
    }

    fn stroke(&mut self, path: &Path, color: Color, width: f32) {
        let stroke = Stroke {
            width,
            ..Default::default()
        };
        self.pixmap
            .stroke_path(path, &solid(color), &stroke, Transform::identity(), None);
    }

    fn draw_image(&mut self, img: &BaseImage) -> Result<()> {
        let src = image_to_pixmap(&img.0)?;
        let sx = self.width() as f32 / src.width() as f32;
        let sy = self.height() as f32 / src.height() as f32;
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..Default::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, src.as_ref(), &paint, Transform::from_scale(sx, sy), None);
        Ok(())
    }

    // Blurred, offset copy of `path` composited under whatever is drawn next
    fn draw_shadow(&mut self, path: &Path, rect: &Rect, shadow: &Shadow) -> Result<()> {
        let margin = (shadow.blur * 2.0).ceil();
        let origin_x = (rect.x + shadow.offset.x - margin).floor();
        let origin_y = (rect.y + shadow.offset.y - margin).floor();
        let w = (rect.width + margin * 2.0).ceil() as u32 + 1;
        let h = (rect.height + margin * 2.0).ceil() as u32 + 1;
        let mut layer = Pixmap::new(w, h)
            .ok_or_else(|| Error::RenderError("cannot allocate shadow layer".into()))?;
        let t = Transform::from_translate(shadow.offset.x - origin_x, shadow.offset.y - origin_y);
        layer.fill_path(path, &solid(shadow.color), FillRule::Winding, t, None);

        if shadow.blur > 0.0 {
            blur_layer(&mut layer, shadow.blur / 2.0)?;
        }
        self.pixmap.draw_pixmap(
            origin_x as i32,
            origin_y as i32,
            layer.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        Ok(())
    }

    fn draw_text(&mut self, origin: Point, text: &str, size: f32, bold: bool, color: Color) {
        let row_h = self.font.row_height(size);
        let top = origin.y - self.font.ascent(size);
        let mut pen_x = origin.x;
        let mut pb = PathBuilder::new();
        for ch in text.chars() {
            let advance = self.font.advance(ch, size);
            if let Some(glyph) = self.font.glyph(ch) {
                let col_w = advance / 8.0;
                // Bold doubles each lit column's width
                let cell_w = if bold { col_w * 2.0 } else { col_w };
                for (row, bits) in glyph.iter().enumerate() {
                    for col in 0..8 {
                        if (bits >> col) & 1 == 0 {
                            continue;
                        }
                        let x = pen_x + col as f32 * col_w;
                        let y = top + row as f32 * row_h;
                        if let Some(r) = tiny_skia::Rect::from_xywh(x, y, cell_w, row_h) {
                            pb.push_rect(r);
                        }
                    }
                }
            }
            pen_x += advance;
        }
        if let Some(path) = pb.finish() {
            self.fill(&path, color);
        }
    }

    /// Demultiplied RGBA at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        let mut data = Vec::with_capacity(self.pixmap.data().len());
        for p in self.pixmap.pixels() {
            let c = p.demultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        RgbaImage::from_raw(self.width(), self.height(), data)
            .ok_or_else(|| Error::RenderError("surface buffer size mismatch".into()))
    }

    /// Encode exactly what is painted right now as PNG
    pub fn snapshot(&self) -> Result<Screenshot> {
        let png_data = self
            .pixmap
            .encode_png()
            .map_err(|e| Error::ExportError(format!("PNG encoding failed: {}", e)))?;
        Ok(Screenshot {
            width: self.width(),
            height: self.height(),
            png_data,
        })
    }
}

/// Shared handle to one drawing surface.
///
/// The compositor installs a freshly sized surface on every render and the
/// exporter reads from the same handle. Before the first successful render
/// the slot is empty. A surface showing the loading placeholder, or one left
/// over from a failed render, is installed but not ready. Clones share the
/// slot and the export-in-flight flag.
#[derive(Clone, Default)]
pub struct SurfaceHandle {
    inner: Arc<Mutex<Slot>>,
    exporting: Arc<AtomicBool>,
}

#[derive(Default)]
struct Slot {
    surface: Option<Surface>,
    ready: bool,
}

impl SurfaceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slot>> {
        self.inner
            .lock()
            .map_err(|_| Error::Other("surface lock poisoned".into()))
    }

    pub(crate) fn export_flag(&self) -> &AtomicBool {
        &self.exporting
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().map(|g| g.surface.is_some()).unwrap_or(false)
    }

    /// Whether the installed surface shows a loaded image
    pub fn is_ready(&self) -> bool {
        self.lock().map(|g| g.ready && g.surface.is_some()).unwrap_or(false)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let guard = self.lock().ok()?;
        guard.surface.as_ref().map(|s| (s.width(), s.height()))
    }

    /// Replace whatever surface is installed. `ready` is false for
    /// placeholder frames.
    pub fn install(&self, surface: Surface, ready: bool) -> Result<()> {
        let mut slot = self.lock()?;
        slot.surface = Some(surface);
        slot.ready = ready;
        Ok(())
    }

    /// Keep the current pixels but stop treating them as the latest frame
    pub fn mark_stale(&self) -> Result<()> {
        self.lock()?.ready = false;
        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        let mut slot = self.lock()?;
        slot.surface = None;
        slot.ready = false;
        Ok(())
    }

    pub fn with_surface<T>(&self, f: impl FnOnce(&mut Surface) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let surface = guard
            .surface
            .as_mut()
            .ok_or_else(|| Error::RenderError("surface not initialized".into()))?;
        f(surface)
    }

    pub fn snapshot(&self) -> Result<Screenshot> {
        self.with_surface(|s| s.snapshot())
    }

    /// PNG of the surface, failing unless it shows a loaded image. The ready
    /// bit and the pixels are read under one lock.
    pub fn ready_snapshot(&self) -> Result<Screenshot> {
        let guard = self.lock()?;
        match guard.surface.as_ref() {
            None => Err(Error::ExportError("surface not initialized".into())),
            Some(_) if !guard.ready => Err(Error::ExportError("surface not ready".into())),
            Some(surface) => surface.snapshot(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.with_surface(|s| Ok(s.pixel(x, y))).ok().flatten()
    }
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.alpha_u8());
    paint.anti_alias = true;
    paint
}

fn skia_rect(rect: &Rect) -> Result<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)
        .ok_or_else(|| Error::RenderError(format!("invalid rect {:?}", rect)))
}

/// Rounded rectangle traced with quadratic corners. With `round_bottom`
/// false only the two top corners are rounded.
fn rounded_rect_path(rect: &Rect, radius: f32, round_bottom: bool) -> Result<Path> {
    let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);
    let mut pb = PathBuilder::new();
    pb.move_to(x + radius, y);
    pb.line_to(x + w - radius, y);
    pb.quad_to(x + w, y, x + w, y + radius);
    if round_bottom {
        pb.line_to(x + w, y + h - radius);
        pb.quad_to(x + w, y + h, x + w - radius, y + h);
        pb.line_to(x + radius, y + h);
        pb.quad_to(x, y + h, x, y + h - radius);
    } else {
        pb.line_to(x + w, y + h);
        pb.line_to(x, y + h);
    }
    pb.line_to(x, y + radius);
    pb.quad_to(x, y, x + radius, y);
    pb.close();
    pb.finish()
        .ok_or_else(|| Error::RenderError(format!("degenerate rounded rect {:?}", rect)))
}

fn image_to_pixmap(img: &RgbaImage) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(img.width(), img.height()).ok_or_else(|| {
        Error::RenderError(format!(
            "cannot allocate {}x{} image buffer",
            img.width(),
            img.height()
        ))
    })?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(img.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

/// Gaussian blur of a premultiplied layer. Channels blur independently, so
/// premultiplied values stay consistent.
fn blur_layer(layer: &mut Pixmap, sigma: f32) -> Result<()> {
    let (w, h) = (layer.width(), layer.height());
    let img = RgbaImage::from_raw(w, h, layer.data().to_vec())
        .ok_or_else(|| Error::RenderError(format!("shadow layer {}x{} has a bad size", w, h)))?;
    let blurred = imageops::blur(&img, sigma);
    layer.data_mut().copy_from_slice(blurred.as_raw());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn near(a: [u8; 4], b: [u8; 4], tol: i32) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (*x as i32 - *y as i32).abs() <= tol)
    }

    #[test]
    fn fill_rect_blends_over_white() {
        let mut s = Surface::new(20, 20).unwrap();
        s.execute_all(&[
            PaintCommand::FillRect {
                rect: Rect { x: 0.0, y: 0.0, width: 20.0, height: 20.0 },
                color: Color::WHITE,
            },
            PaintCommand::FillRect {
                rect: Rect { x: 0.0, y: 0.0, width: 20.0, height: 20.0 },
                color: Color::rgba(0, 0, 0, 0.1),
            },
        ])
        .unwrap();
        assert!(near(s.pixel(10, 10).unwrap(), [230, 230, 230, 255], 1));
    }

    #[test]
    fn clear_makes_everything_transparent() {
        let mut s = Surface::new(4, 4).unwrap();
        s.execute(&PaintCommand::FillRect {
            rect: Rect { x: 0.0, y: 0.0, width: 4.0, height: 4.0 },
            color: Color::BLACK,
        })
        .unwrap();
        s.execute(&PaintCommand::Clear).unwrap();
        assert_eq!(s.pixel(1, 1).unwrap()[3], 0);
    }

    #[test]
    fn text_lights_pixels_on_the_baseline_row() {
        let mut s = Surface::new(40, 20).unwrap();
        s.execute(&PaintCommand::Text {
            origin: Point::new(2.0, 16.0),
            text: "H".into(),
            size: 14.0,
            bold: false,
            color: Color::BLACK,
        })
        .unwrap();
        let lit = (0..40)
            .flat_map(|x| (0..20).map(move |y| (x, y)))
            .filter(|(x, y)| s.pixel(*x, *y).unwrap()[3] > 0)
            .count();
        assert!(lit > 10, "expected glyph pixels, got {}", lit);
        // Nothing drawn past the advance
        assert!((12..40).all(|x| (0..20).all(|y| s.pixel(x, y).unwrap()[3] == 0)));
    }

    #[test]
    fn shadow_spills_outside_the_card() {
        let mut s = Surface::new(100, 100).unwrap();
        s.execute(&PaintCommand::RoundedRect {
            rect: Rect { x: 20.0, y: 20.0, width: 50.0, height: 50.0 },
            radius: 8.0,
            fill: Color::WHITE,
            stroke: Color::BLACK,
            stroke_width: 2.0,
            shadow: Some(Shadow::CARD),
        })
        .unwrap();
        // Below-right of the card only the shadow reaches
        let p = s.pixel(45, 74).unwrap();
        assert!(p[3] > 0 && p[0] < 50, "unexpected shadow pixel {:?}", p);
        assert_eq!(s.pixel(45, 45).unwrap(), [255, 255, 255, 255]);
    }

    #[test]
    fn handle_reports_uninitialized() {
        let h = SurfaceHandle::new();
        assert!(!h.is_initialized());
        assert!(h.snapshot().is_err());
        h.install(Surface::new(8, 8).unwrap(), true).unwrap();
        assert_eq!(h.dimensions(), Some((8, 8)));
        let shot = h.snapshot().unwrap();
        assert_eq!(&shot.png_data[0..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn placeholder_frames_are_not_ready() {
        let h = SurfaceHandle::new();
        assert!(matches!(h.ready_snapshot(), Err(Error::ExportError(_))));
        h.install(Surface::new(8, 8).unwrap(), false).unwrap();
        assert!(h.is_initialized() && !h.is_ready());
        assert!(matches!(h.ready_snapshot(), Err(Error::ExportError(_))));
        // Pixels stay readable for display
        assert!(h.snapshot().is_ok());

        h.install(Surface::new(8, 8).unwrap(), true).unwrap();
        assert!(h.ready_snapshot().is_ok());
        h.mark_stale().unwrap();
        assert!(!h.is_ready());
        assert!(h.ready_snapshot().is_err());
    }

    #[test]
    fn shadow_layer_blur_spreads_alpha() {
        let mut layer = Pixmap::new(21, 21).unwrap();
        layer.fill_rect(
            tiny_skia::Rect::from_xywh(8.0, 8.0, 5.0, 5.0).unwrap(),
            &solid(Color::BLACK),
            Transform::identity(),
            None,
        );
        let before = layer.pixel(10, 10).unwrap().alpha();
        blur_layer(&mut layer, 2.0).unwrap();
        let center = layer.pixel(10, 10).unwrap();
        let edge = layer.pixel(5, 10).unwrap();
        assert!(center.alpha() < before && center.alpha() > 0);
        assert!(edge.alpha() > 0 && edge.alpha() < center.alpha());
        assert_eq!(layer.pixel(0, 0).unwrap().alpha(), 0);
        // Premultiplied channels never exceed alpha
        assert!(edge.red() <= edge.alpha());
    }
}
