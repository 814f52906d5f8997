//! PNG export of whatever is currently painted on a surface.
//!
//! An [`Exporter`] is bound to one [`SurfaceHandle`]. Exports of the same
//! surface never overlap, even across exporters sharing the handle: a call
//! made while another is in flight returns [`ExportOutcome::Skipped`]
//! immediately and is not queued.

use crate::rendering::raster::SurfaceHandle;
use crate::rendering::Screenshot;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Replace every non-alphanumeric character of the stem with `-`, keeping a
/// trailing `.png`.
pub fn sanitize_filename(name: &str) -> String {
    let stem = name
        .strip_suffix(".png")
        .or_else(|| name.strip_suffix(".PNG"))
        .unwrap_or(name);
    let clean: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{}.png", clean)
}

/// `annotated-<url with non-alphanumerics replaced>.png`
pub fn export_filename_for_url(url: &str) -> String {
    sanitize_filename(&format!("annotated-{}", url))
}

/// Where exported bytes end up
pub trait ExportSink {
    /// Deliver `png` under `filename` (already sanitized). Returns a
    /// description of where it went.
    fn deliver(&self, filename: &str, png: &[u8]) -> Result<String>;
}

/// Writes exports into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl ExportSink for DirectorySink {
    fn deliver(&self, filename: &str, png: &[u8]) -> Result<String> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::ExportError(format!("cannot create {}: {}", self.dir.display(), e))
        })?;
        let target = self.dir.join(filename);
        // A truncated PNG must never appear under the final name
        let partial = self.dir.join(format!("{}.part", filename));
        std::fs::write(&partial, png)
            .and_then(|_| std::fs::rename(&partial, &target))
            .map_err(|e| {
                let _ = std::fs::remove_file(&partial);
                Error::ExportError(format!("cannot write {}: {}", target.display(), e))
            })?;
        Ok(target.display().to_string())
    }
}

/// Keeps exports in memory, for callers that upload the bytes themselves
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(String, Vec<u8>)> {
        self.files
            .lock()
            .map(|mut f| std::mem::take(&mut *f))
            .unwrap_or_default()
    }
}

impl ExportSink for MemorySink {
    fn deliver(&self, filename: &str, png: &[u8]) -> Result<String> {
        self.files
            .lock()
            .map_err(|_| Error::Other("memory sink lock poisoned".into()))?
            .push((filename.to_string(), png.to_vec()));
        Ok(format!("memory:{}", filename))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Delivered under `filename`; `location` comes from the sink
    Delivered { filename: String, location: String },
    /// Another export on the same surface was still running
    Skipped,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct Exporter {
    surface: SurfaceHandle,
}

impl Exporter {
    pub fn new(surface: SurfaceHandle) -> Self {
        Self { surface }
    }

    pub fn is_busy(&self) -> bool {
        self.surface.export_flag().load(Ordering::Acquire)
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        let flag = self.surface.export_flag();
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }

    // Placeholder and stale frames are never exported
    fn snapshot(&self) -> Result<Screenshot> {
        self.surface.ready_snapshot()
    }

    /// PNG of the current surface, or `None` if an export is in flight
    pub fn export_png(&self) -> Result<Option<Screenshot>> {
        let Some(_guard) = self.begin() else {
            log::debug!("export skipped: another export is in flight");
            return Ok(None);
        };
        self.snapshot().map(Some)
    }

    /// `data:image/png;base64,...` of the current surface
    pub fn export_data_url(&self) -> Result<Option<String>> {
        Ok(self.export_png()?.map(|s| s.to_data_url()))
    }

    /// Encode the surface and hand it to `sink` under the sanitized `filename`
    pub fn export_to(&self, sink: &dyn ExportSink, filename: &str) -> Result<ExportOutcome> {
        let Some(_guard) = self.begin() else {
            log::debug!("export of {} skipped: another export is in flight", filename);
            return Ok(ExportOutcome::Skipped);
        };
        let filename = sanitize_filename(filename);
        let shot = self.snapshot().map_err(|e| {
            log::warn!("export of {} failed: {}", filename, e);
            e
        })?;
        let location = sink.deliver(&filename, &shot.png_data)?;
        log::info!(
            "exported {}x{} PNG ({} bytes) to {}",
            shot.width,
            shot.height,
            shot.png_data.len(),
            location
        );
        Ok(ExportOutcome::Delivered { filename, location })
    }
}
