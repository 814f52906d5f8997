//! One annotation surface: store, compositor and click handling wired together.
//!
//! Every list-changing store call raises a dirty flag through the store's
//! change callback; the surface re-renders the full scene whenever the flag
//! is up. Loading a new base image empties the store.

use crate::analysis::{normalize_items, AnalysisItem};
use crate::annotation::{Annotation, AnnotationPatch, AnnotationStore, AnnotationTemplate};
use crate::compositor::{
    decode_source, Compositor, ImageSource, LoadOutcome, LoadToken, SourceImage, SurfaceState,
};
use crate::export::Exporter;
use crate::interaction::{InteractionAdapter, PointerEvent, SurfaceRect};
use crate::rendering::paint::PaintCommand;
use crate::rendering::raster::SurfaceHandle;
use crate::rendering::Screenshot;
use crate::{Error, Result, SurfaceConfig, Viewport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct AnnotationSurface {
    store: AnnotationStore,
    compositor: Compositor,
    adapter: InteractionAdapter,
    dirty: Arc<AtomicBool>,
}

impl AnnotationSurface {
    pub fn new(config: SurfaceConfig) -> Self {
        Self::with_handle(config, SurfaceHandle::new())
    }

    /// Build a surface that paints into an existing handle
    pub fn with_handle(config: SurfaceConfig, handle: SurfaceHandle) -> Self {
        let dirty = Arc::new(AtomicBool::new(true));
        let mut store = AnnotationStore::new();
        let flag = dirty.clone();
        store.on_change(move |_| flag.store(true, Ordering::Release));
        Self {
            store,
            compositor: Compositor::new(&config, handle),
            adapter: InteractionAdapter::new(config.editable),
            dirty,
        }
    }

    pub fn handle(&self) -> SurfaceHandle {
        self.compositor.handle()
    }

    pub fn exporter(&self) -> Exporter {
        Exporter::new(self.handle())
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn annotations(&self) -> &[Annotation] {
        self.store.list()
    }

    pub fn state(&self) -> &SurfaceState {
        self.compositor.state()
    }

    pub fn is_ready(&self) -> bool {
        self.compositor.is_ready()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Logical pixel size of the surface
    pub fn size(&self) -> (u32, u32) {
        self.compositor.surface_size()
    }

    pub fn is_editable(&self) -> bool {
        self.adapter.is_editable()
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.adapter.set_editable(editable);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.compositor.set_viewport(viewport);
        self.mark_dirty();
        self.refresh_logged();
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Re-render if anything changed since the last render. Returns whether a
    /// render happened.
    pub fn refresh(&mut self) -> Result<bool> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }
        if let Err(e) = self.compositor.render(self.store.list()) {
            self.mark_dirty();
            return Err(e);
        }
        Ok(true)
    }

    fn refresh_logged(&mut self) {
        if let Err(e) = self.refresh() {
            log::warn!("re-render failed: {}", e);
        }
    }

    pub fn add(&mut self, annotation: Annotation) -> Result<()> {
        self.store.add(annotation)?;
        self.refresh_logged();
        Ok(())
    }

    /// Add already-normalized annotations as one batch
    pub fn insert_annotations(&mut self, batch: Vec<Annotation>) -> Result<usize> {
        let n = self.store.extend(batch)?;
        self.refresh_logged();
        Ok(n)
    }

    pub fn update(&mut self, id: &str, patch: AnnotationPatch) -> bool {
        let changed = self.store.update(id, patch);
        self.refresh_logged();
        changed
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let removed = self.store.delete(id);
        self.refresh_logged();
        removed
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.refresh_logged();
    }

    /// Retext/retype the most recent annotation from a template
    pub fn apply_template(&mut self, template: &AnnotationTemplate) -> Option<String> {
        let id = self.store.apply_template(template);
        self.refresh_logged();
        id
    }

    /// Start loading a new base image; earlier loads become stale
    pub fn begin_load(&mut self) -> LoadToken {
        let token = self.compositor.begin_load();
        self.mark_dirty();
        self.refresh_logged();
        token
    }

    pub fn complete_load(&mut self, token: LoadToken, result: Result<SourceImage>) -> LoadOutcome {
        let outcome = self.compositor.complete_load(token, result);
        match &outcome {
            // A new image starts with an empty store
            LoadOutcome::Applied => self.store.clear(),
            LoadOutcome::Failed(_) => self.mark_dirty(),
            LoadOutcome::Stale => {}
        }
        self.refresh_logged();
        outcome
    }

    /// Decode `source` on this thread and apply it
    pub fn load(&mut self, source: &ImageSource) -> LoadOutcome {
        let token = self.begin_load();
        let result = decode_source(source);
        self.complete_load(token, result)
    }

    /// Handle a click on the displayed surface. Returns the annotation that
    /// was added, or `None` when the surface is read-only or has no image.
    pub fn click(&mut self, event: PointerEvent, rect: SurfaceRect) -> Result<Option<Annotation>> {
        if !self.is_ready() {
            log::debug!("click ignored: no base image");
            return Ok(None);
        }
        let Some(annotation) = self.adapter.handle_click(event, rect, self.size()) else {
            return Ok(None);
        };
        self.add(annotation.clone())?;
        Ok(Some(annotation))
    }

    /// Normalize analysis items to this surface's pixel space and insert them
    pub fn insert_analysis(&mut self, items: &[AnalysisItem]) -> Result<usize> {
        if !self.is_ready() {
            return Err(Error::LoadError(
                "analysis results need a loaded base image".into(),
            ));
        }
        let (w, h) = self.size();
        self.insert_annotations(normalize_items(items, w, h))
    }

    pub fn display_list(&self) -> Vec<PaintCommand> {
        self.compositor.display_list(self.store.list())
    }

    /// PNG of what is currently painted
    pub fn snapshot(&self) -> Result<Screenshot> {
        self.handle().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{find_template, AnnotationKind};
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([200, 200, 200, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn ready_surface() -> AnnotationSurface {
        let mut s = AnnotationSurface::new(SurfaceConfig {
            editable: true,
            ..Default::default()
        });
        assert_eq!(s.load(&ImageSource::Bytes(png(80, 60))), LoadOutcome::Applied);
        s
    }

    #[test]
    fn mutations_rerender() {
        let mut s = ready_surface();
        assert!(!s.is_dirty());
        s.add(Annotation::new("a1", 100.0, 100.0, "Low contrast", AnnotationKind::Warning))
            .unwrap();
        assert!(!s.is_dirty());
        assert!(s.handle().is_initialized());
        assert_eq!(s.handle().dimensions(), Some((800, 600)));
        // Unknown ids still leave the surface clean
        assert!(!s.delete("nope"));
        assert!(!s.refresh().unwrap());
    }

    #[test]
    fn new_image_empties_store() {
        let mut s = ready_surface();
        s.add(Annotation::new("a1", 1.0, 1.0, "", AnnotationKind::Error)).unwrap();
        assert_eq!(s.load(&ImageSource::Bytes(png(40, 40))), LoadOutcome::Applied);
        assert!(s.annotations().is_empty());
        assert_eq!(s.size(), (600, 600));
    }

    #[test]
    fn failed_load_keeps_placeholder_and_ignores_clicks() {
        let mut s = AnnotationSurface::new(SurfaceConfig {
            editable: true,
            ..Default::default()
        });
        assert!(matches!(s.load(&ImageSource::Bytes(vec![1, 2, 3])), LoadOutcome::Failed(_)));
        let rect = SurfaceRect::unscaled(0.0, 0.0, s.size());
        let clicked = s
            .click(PointerEvent { client_x: 5.0, client_y: 5.0 }, rect)
            .unwrap();
        assert!(clicked.is_none());
        assert!(s.annotations().is_empty());
        assert!(s.handle().is_initialized());
    }

    #[test]
    fn click_then_template() {
        let mut s = ready_surface();
        let rect = SurfaceRect::unscaled(8.0, 8.0, s.size());
        let a = s
            .click(PointerEvent { client_x: 108.0, client_y: 58.0 }, rect)
            .unwrap()
            .unwrap();
        assert_eq!((a.x, a.y), (100.0, 50.0));
        let template = find_template("low-contrast").unwrap();
        assert_eq!(s.apply_template(template), Some(a.id.clone()));
        assert_eq!(s.store().get(&a.id).unwrap().kind, template.kind);
    }

    #[test]
    fn analysis_needs_an_image() {
        let mut s = AnnotationSurface::new(SurfaceConfig::default());
        let items = [AnalysisItem::fractional("x", "bogus", 0.5, 0.5)];
        assert!(s.insert_analysis(&items).is_err());
        let mut s = ready_surface();
        assert_eq!(s.insert_analysis(&items).unwrap(), 1);
        assert_eq!((s.annotations()[0].x, s.annotations()[0].y), (400.0, 300.0));
    }
}
