//! Compositor: base image + overlay + callouts into one raster surface.
//!
//! Every render rebuilds the whole display list and paints it onto a freshly
//! sized surface; nothing is redrawn incrementally. Image loads are tracked
//! with a monotonically increasing token so a completion that arrives after
//! a newer request is simply dropped.

use crate::annotation::Annotation;
use crate::rendering::font::{BitmapFont, FontMetrics};
use crate::rendering::layout::{fit_to_aspect, layout_callout, Point, Rect, FONT_SIZE};
use crate::rendering::paint::{callout_commands, BaseImage, Color, PaintCommand};
use crate::rendering::raster::{Surface, SurfaceHandle};
use crate::{Error, Result, SurfaceConfig, Viewport};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;

pub const PLACEHOLDER_TEXT: &str = "Loading screenshot...";
pub const PLACEHOLDER_FILL: Color = Color::rgb(0xF0, 0xF0, 0xF0);
pub const PLACEHOLDER_TEXT_COLOR: Color = Color::rgb(0x88, 0x88, 0x88);

/// Where a base image comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
    /// `data:image/<fmt>;base64,<payload>`
    DataUrl(String),
    /// `http(s)://` URL, fetched with the `remote` feature
    Url(String),
}

impl ImageSource {
    /// Classify a user-supplied string as a data URL, web URL or file path
    pub fn parse(s: &str) -> Self {
        if s.starts_with("data:") {
            ImageSource::DataUrl(s.to_string())
        } else if s.starts_with("http://") || s.starts_with("https://") {
            ImageSource::Url(s.to_string())
        } else {
            ImageSource::Path(PathBuf::from(s))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ImageSource::Bytes(b) => format!("{} bytes", b.len()),
            ImageSource::Path(p) => p.display().to_string(),
            ImageSource::DataUrl(u) => format!("data URL ({} chars)", u.len()),
            ImageSource::Url(u) => u.clone(),
        }
    }
}

/// A decoded base image at its natural resolution
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: Arc<RgbaImage>,
}

impl SourceImage {
    pub fn natural_width(&self) -> u32 {
        self.image.width()
    }

    pub fn natural_height(&self) -> u32 {
        self.image.height()
    }
}

pub fn decode_bytes(bytes: &[u8]) -> Result<SourceImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::LoadError(format!("cannot decode image: {}", e)))?;
    let rgba = img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(Error::LoadError("image has zero size".into()));
    }
    Ok(SourceImage {
        image: Arc::new(rgba),
    })
}

/// Payload bytes of a base64 `data:` URL
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| Error::LoadError("not a data URL".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::LoadError("data URL has no payload".into()))?;
    if !header.ends_with(";base64") {
        return Err(Error::LoadError(format!(
            "unsupported data URL encoding '{}'",
            header
        )));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::LoadError(format!("invalid base64 payload: {}", e)))
}

/// Blocking decode of any image source
pub fn decode_source(source: &ImageSource) -> Result<SourceImage> {
    match source {
        ImageSource::Bytes(bytes) => decode_bytes(bytes),
        ImageSource::Path(path) => {
            let bytes = std::fs::read(path).map_err(|e| {
                Error::LoadError(format!("cannot read {}: {}", path.display(), e))
            })?;
            decode_bytes(&bytes)
        }
        ImageSource::DataUrl(url) => decode_bytes(&decode_data_url(url)?),
        ImageSource::Url(url) => decode_bytes(&fetch_image(url)?),
    }
}

#[cfg(feature = "remote")]
fn fetch_image(url: &str) -> Result<Vec<u8>> {
    let res = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::LoadError(format!("GET {} failed: {}", url, e)))?;
    let bytes = res
        .bytes()
        .map_err(|e| Error::LoadError(format!("reading {} failed: {}", url, e)))?;
    Ok(bytes.to_vec())
}

#[cfg(not(feature = "remote"))]
fn fetch_image(url: &str) -> Result<Vec<u8>> {
    Err(Error::LoadError(format!(
        "cannot fetch {}: built without the `remote` feature",
        url
    )))
}

/// Identifies one image load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadToken(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceState {
    /// No image yet, or a load is in flight
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Applied,
    /// A newer request superseded this one; the result was ignored
    Stale,
    Failed(String),
}

pub struct Compositor {
    viewport: Viewport,
    overlay_alpha: f32,
    font: BitmapFont,
    current: u64,
    state: SurfaceState,
    source: Option<SourceImage>,
    base: Option<BaseImage>,
    handle: SurfaceHandle,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("viewport", &self.viewport)
            .field("state", &self.state)
            .field("current", &self.current)
            .field("base", &self.base)
            .finish()
    }
}

impl Compositor {
    pub fn new(config: &SurfaceConfig, handle: SurfaceHandle) -> Self {
        Self {
            viewport: config.viewport,
            overlay_alpha: config.overlay_alpha,
            font: BitmapFont::new(),
            current: 0,
            state: SurfaceState::Loading,
            source: None,
            base: None,
            handle,
        }
    }

    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SurfaceState::Ready && self.base.is_some()
    }

    pub fn handle(&self) -> SurfaceHandle {
        self.handle.clone()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Logical surface size: the aspect-fitted image size once ready,
    /// otherwise the requested viewport.
    pub fn surface_size(&self) -> (u32, u32) {
        match &self.base {
            Some(base) if self.state == SurfaceState::Ready => (base.width(), base.height()),
            _ => (self.viewport.width.max(1), self.viewport.height.max(1)),
        }
    }

    /// Start a new load. Any load started earlier becomes stale.
    pub fn begin_load(&mut self) -> LoadToken {
        self.current += 1;
        self.state = SurfaceState::Loading;
        self.source = None;
        self.base = None;
        log::debug!("image load {} requested", self.current);
        LoadToken(self.current)
    }

    pub fn is_current(&self, token: LoadToken) -> bool {
        token.0 == self.current
    }

    /// Apply the result of the load identified by `token`
    pub fn complete_load(&mut self, token: LoadToken, result: Result<SourceImage>) -> LoadOutcome {
        if !self.is_current(token) {
            log::debug!(
                "dropping stale image load {} (current is {})",
                token.0,
                self.current
            );
            return LoadOutcome::Stale;
        }
        match result {
            Ok(img) => {
                log::info!(
                    "image load {} ready ({}x{})",
                    token.0,
                    img.natural_width(),
                    img.natural_height()
                );
                self.apply_source(img);
                LoadOutcome::Applied
            }
            Err(e) => {
                let msg = e.to_string();
                log::warn!("image load {} failed: {}", token.0, msg);
                self.state = SurfaceState::Failed(msg.clone());
                LoadOutcome::Failed(msg)
            }
        }
    }

    /// Synchronous load: decode on the calling thread and apply
    pub fn load(&mut self, source: &ImageSource) -> LoadOutcome {
        let token = self.begin_load();
        log::debug!("loading {}", source.describe());
        let result = decode_source(source);
        self.complete_load(token, result)
    }

    /// Change the requested render box; a loaded image is refitted
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if let Some(src) = self.source.take() {
            self.apply_source(src);
        }
    }

    fn apply_source(&mut self, src: SourceImage) {
        let (w, h) = fit_to_aspect(self.viewport, src.natural_width(), src.natural_height());
        let scaled = if (w, h) == (src.natural_width(), src.natural_height()) {
            src.image.clone()
        } else {
            Arc::new(imageops::resize(&*src.image, w, h, FilterType::Triangle))
        };
        self.base = Some(BaseImage(scaled));
        self.source = Some(src);
        self.state = SurfaceState::Ready;
    }

    /// Full display list for the current state and `annotations`, in paint order
    pub fn display_list(&self, annotations: &[Annotation]) -> Vec<PaintCommand> {
        let (w, h) = self.surface_size();
        let (wf, hf) = (w as f32, h as f32);
        let full = Rect {
            x: 0.0,
            y: 0.0,
            width: wf,
            height: hf,
        };

        let base = match &self.base {
            Some(base) if self.state == SurfaceState::Ready => base,
            _ => return self.placeholder(full),
        };

        let mut cmds = vec![
            PaintCommand::Clear,
            PaintCommand::Image(base.clone()),
            PaintCommand::FillRect {
                rect: full,
                color: Color::rgba(0, 0, 0, self.overlay_alpha),
            },
        ];
        for a in annotations {
            let layout = layout_callout(a, wf, hf, &self.font);
            cmds.extend(callout_commands(&layout));
        }
        cmds
    }

    fn placeholder(&self, full: Rect) -> Vec<PaintCommand> {
        let text_w = self.font.measure(PLACEHOLDER_TEXT, FONT_SIZE);
        let origin = Point::new(
            ((full.width - text_w) / 2.0).max(0.0),
            full.height / 2.0 + self.font.ascent(FONT_SIZE) / 2.0,
        );
        vec![
            PaintCommand::Clear,
            PaintCommand::FillRect {
                rect: full,
                color: PLACEHOLDER_FILL,
            },
            PaintCommand::Text {
                origin,
                text: PLACEHOLDER_TEXT.to_string(),
                size: FONT_SIZE,
                bold: false,
                color: PLACEHOLDER_TEXT_COLOR,
            },
        ]
    }

    /// Re-execute the whole render sequence onto a new surface and publish it
    /// through the shared handle.
    pub fn render(&self, annotations: &[Annotation]) -> Result<()> {
        let (w, h) = self.surface_size();
        let cmds = self.display_list(annotations);
        let painted = Surface::new(w, h).and_then(|mut surface| {
            surface.execute_all(&cmds)?;
            Ok(surface)
        });
        let surface = match painted {
            Ok(surface) => surface,
            Err(e) => {
                // The previous frame no longer matches the annotations
                self.handle.mark_stale()?;
                return Err(e);
            }
        };
        self.handle.install(surface, self.is_ready())?;
        log::debug!(
            "rendered {} annotations ({} commands) at {}x{}",
            if self.is_ready() { annotations.len() } else { 0 },
            cmds.len(),
            w,
            h
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationKind;
    use image::Rgba;
    use std::io::Cursor;

    pub(crate) fn png_bytes(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba(px));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn compositor() -> Compositor {
        Compositor::new(&SurfaceConfig::default(), SurfaceHandle::new())
    }

    #[test]
    fn source_parsing() {
        assert!(matches!(
            ImageSource::parse("data:image/png;base64,AA=="),
            ImageSource::DataUrl(_)
        ));
        assert!(matches!(ImageSource::parse("https://x.test/a.png"), ImageSource::Url(_)));
        assert!(matches!(ImageSource::parse("shots/a.png"), ImageSource::Path(_)));
    }

    #[test]
    fn data_url_roundtrip_decodes() {
        let png = png_bytes(4, 3, [1, 2, 3, 255]);
        let url = format!("data:image/png;base64,{}", STANDARD.encode(&png));
        let img = decode_source(&ImageSource::DataUrl(url)).unwrap();
        assert_eq!((img.natural_width(), img.natural_height()), (4, 3));
        assert!(decode_data_url("data:text/plain,hello").is_err());
    }

    #[test]
    fn undecodable_bytes_fail_to_placeholder() {
        let mut c = compositor();
        let outcome = c.load(&ImageSource::Bytes(b"not an image".to_vec()));
        assert!(matches!(outcome, LoadOutcome::Failed(_)));
        assert!(matches!(c.state(), SurfaceState::Failed(_)));
        let a = Annotation::new("a1", 10.0, 10.0, "x", AnnotationKind::Error);
        let cmds = c.display_list(&[a]);
        assert_eq!(cmds.len(), 3);
        assert!(!cmds.iter().any(|c| matches!(c, PaintCommand::Circle { .. })));
    }

    #[test]
    fn stale_completion_is_dropped() {
        let mut c = compositor();
        let first = c.begin_load();
        let second = c.begin_load();
        let late = decode_bytes(&png_bytes(10, 10, [255, 0, 0, 255])).unwrap();
        assert_eq!(c.complete_load(first, Ok(late)), LoadOutcome::Stale);
        assert_eq!(c.state(), &SurfaceState::Loading);
        let fresh = decode_bytes(&png_bytes(40, 30, [0, 0, 255, 255])).unwrap();
        assert_eq!(c.complete_load(second, Ok(fresh)), LoadOutcome::Applied);
        assert_eq!(c.surface_size(), (800, 600));
    }

    #[test]
    fn display_list_order() {
        let mut c = compositor();
        let base = ImageSource::Bytes(png_bytes(16, 12, [9, 9, 9, 255]));
        assert_eq!(c.load(&base), LoadOutcome::Applied);
        let annos = [
            Annotation::new("a", 100.0, 100.0, "one", AnnotationKind::Warning),
            Annotation::new("b", 300.0, 300.0, "two", AnnotationKind::Error),
        ];
        let cmds = c.display_list(&annos);
        assert_eq!(cmds[0], PaintCommand::Clear);
        assert!(matches!(cmds[1], PaintCommand::Image(_)));
        match &cmds[2] {
            PaintCommand::FillRect { rect, color } => {
                assert_eq!((rect.width, rect.height), (800.0, 600.0));
                assert_eq!(color.to_css(), "rgba(0,0,0,0.1)");
            }
            other => panic!("expected overlay, got {:?}", other),
        }
        // 7 commands per single-line callout
        assert_eq!(cmds.len(), 3 + 7 * 2);
        match (&cmds[3], &cmds[10]) {
            (PaintCommand::Line { color: first, .. }, PaintCommand::Line { color: second, .. }) => {
                assert_eq!(first.to_css(), "#FF9500");
                assert_eq!(second.to_css(), "#FF2D2D");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn failed_render_marks_previous_frame_stale() {
        let handle = SurfaceHandle::new();
        let mut c = Compositor::new(&SurfaceConfig::default(), handle.clone());
        c.load(&ImageSource::Bytes(png_bytes(16, 12, [9, 9, 9, 255])));
        c.render(&[]).unwrap();
        assert!(handle.is_ready());

        // Too wide for a pixmap row, so allocation fails without touching memory
        let mut huge = Compositor::new(
            &SurfaceConfig {
                viewport: Viewport { width: 600_000_000, height: 1 },
                ..Default::default()
            },
            handle.clone(),
        );
        huge.begin_load();
        assert!(matches!(huge.render(&[]), Err(Error::RenderError(_))));
        assert!(handle.is_initialized());
        assert!(!handle.is_ready());
        assert!(handle.ready_snapshot().is_err());
    }

    #[test]
    fn placeholder_renders_are_not_ready() {
        let handle = SurfaceHandle::new();
        let mut c = Compositor::new(&SurfaceConfig::default(), handle.clone());
        c.begin_load();
        c.render(&[]).unwrap();
        assert!(handle.is_initialized() && !handle.is_ready());
        c.load(&ImageSource::Bytes(b"nope".to_vec()));
        c.render(&[]).unwrap();
        assert!(!handle.is_ready());
    }

    #[test]
    fn viewport_change_refits() {
        let mut c = compositor();
        c.load(&ImageSource::Bytes(png_bytes(200, 100, [0, 0, 0, 255])));
        assert_eq!(c.surface_size(), (800, 400));
        c.set_viewport(Viewport { width: 300, height: 300 });
        assert_eq!(c.surface_size(), (300, 150));
    }
}
