//! Shotnote
//!
//! Annotate web page screenshots with typed callouts (error, warning,
//! suggestion) and export the flattened result as PNG.
//!
//! # Features
//!
//! - **Deterministic compositing**: callout geometry is a pure function of
//!   the annotation and the canvas size, painted back to front onto a
//!   `tiny-skia` surface
//! - **Stale-load safety**: every image load carries a token, late results
//!   from superseded loads are dropped
//! - **Remote collaborators** (`remote`, default): URL image sources, page
//!   fetching and a Gemini client for automatic analysis and UX critiques
//!
//! # Example
//!
//! ```no_run
//! use shotnote::{
//!     Annotation, AnnotationKind, AnnotationSurface, ImageSource, SurfaceConfig, Viewport,
//! };
//! use shotnote::export::DirectorySink;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SurfaceConfig {
//!     viewport: Viewport { width: 1200, height: 900 },
//!     editable: true,
//!     ..Default::default()
//! };
//!
//! let mut surface = AnnotationSurface::new(config);
//! surface.load(&ImageSource::parse("shot.png"));
//! surface.add(Annotation::new("a1", 100.0, 100.0, "Low contrast", AnnotationKind::Warning))?;
//!
//! let outcome = surface
//!     .exporter()
//!     .export_to(&DirectorySink::new("out"), "annotated-shot.png")?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod analysis;
pub mod annotation;
pub mod compositor;
pub mod critique;
pub mod export;
pub mod interaction;
pub mod loader;
pub mod rendering;
pub mod storage;
pub mod surface;

pub use annotation::{Annotation, AnnotationKind, AnnotationPatch, AnnotationStore, StoreEvent};
pub use compositor::{ImageSource, LoadOutcome, SurfaceState};
pub use export::{ExportOutcome, Exporter};
pub use loader::AsyncSurface;
pub use rendering::Screenshot;
pub use surface::AnnotationSurface;

/// Requested logical render box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Configuration for one annotation surface
///
/// # Examples
///
/// ```
/// let cfg = shotnote::SurfaceConfig::default();
/// assert_eq!(cfg.viewport.width, 800);
/// assert!(!cfg.editable);
/// ```
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// Box the base image is fitted into, keeping its aspect ratio
    pub viewport: Viewport,
    /// Whether clicks create annotations
    pub editable: bool,
    /// Alpha of the black overlay painted over the base image
    pub overlay_alpha: f32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            editable: false,
            overlay_alpha: 0.1,
        }
    }
}

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for page fetching and the generative model
#[derive(Debug, Clone)]
pub struct CritiqueConfig {
    /// API key for the generative model; required only for remote calls
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    /// Timeout for page fetches and model calls in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Maximum characters of body text sent to the model
    pub body_text_limit: usize,
    /// Maximum inline style / `<style>` entries
    pub inline_style_limit: usize,
    pub stylesheet_limit: usize,
    pub palette_limit: usize,
}

impl Default for CritiqueConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: 30000,
            user_agent: concat!("shotnote/", env!("CARGO_PKG_VERSION")).to_string(),
            body_text_limit: 3000,
            inline_style_limit: 10,
            stylesheet_limit: 5,
            palette_limit: 20,
        }
    }
}

impl CritiqueConfig {
    /// Defaults plus `GEMINI_API_KEY` and the optional `SHOTNOTE_MODEL`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        if let Ok(model) = std::env::var("SHOTNOTE_MODEL") {
            if !model.is_empty() {
                cfg.model = model;
            }
        }
        cfg
    }
}
