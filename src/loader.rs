use crate::analysis::AnalysisItem;
use crate::annotation::{Annotation, AnnotationPatch};
use crate::compositor::{
    decode_source, ImageSource, LoadOutcome, LoadToken, SourceImage, SurfaceState,
};
use crate::interaction::{PointerEvent, SurfaceRect};
use crate::rendering::raster::SurfaceHandle;
use crate::rendering::Screenshot;
use crate::surface::AnnotationSurface;
use crate::{Error, Result, SurfaceConfig};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    // Carries its own sender so the worker only holds one while decoding
    Load(ImageSource, Sender<Command>, oneshot::Sender<Result<LoadOutcome>>),
    Decoded(LoadToken, Result<SourceImage>, oneshot::Sender<Result<LoadOutcome>>),
    Add(Annotation, oneshot::Sender<Result<()>>),
    Update(String, AnnotationPatch, oneshot::Sender<bool>),
    Delete(String, oneshot::Sender<bool>),
    Clear(oneshot::Sender<()>),
    Click(PointerEvent, SurfaceRect, oneshot::Sender<Result<Option<Annotation>>>),
    InsertAnalysis(Vec<AnalysisItem>, oneshot::Sender<Result<usize>>),
    List(oneshot::Sender<Vec<Annotation>>),
    State(oneshot::Sender<SurfaceState>),
    Snapshot(oneshot::Sender<Result<Screenshot>>),
    Close(oneshot::Sender<()>),
}

/// Async facade over one [`AnnotationSurface`].
///
/// A dedicated worker thread owns the surface, so every mutation and render
/// for it runs on one thread in submission order. Image decoding runs on its
/// own short-lived thread per request; when it finishes the result is fed
/// back through the worker, which drops it if a newer load was requested in
/// the meantime.
#[derive(Clone)]
pub struct AsyncSurface {
    cmd_tx: Sender<Command>,
    handle: SurfaceHandle,
}

async fn recv<T>(rx: oneshot::Receiver<T>, what: &str) -> Result<T> {
    rx.await
        .map_err(|e| Error::Other(format!("{} canceled: {}", what, e)))
}

impl AsyncSurface {
    /// Spawn the worker thread that owns the surface
    pub fn new(config: SurfaceConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let handle = SurfaceHandle::new();
        let worker_handle = handle.clone();

        thread::spawn(move || {
            let mut surface = AnnotationSurface::with_handle(config, worker_handle);
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Load(source, tx, resp) => {
                        let token = surface.begin_load();
                        thread::spawn(move || {
                            let result = decode_source(&source);
                            // The worker may already be gone; then nobody
                            // is waiting for this result
                            let _ = tx.send(Command::Decoded(token, result, resp));
                        });
                    }
                    Command::Decoded(token, result, resp) => {
                        let _ = resp.send(Ok(surface.complete_load(token, result)));
                    }
                    Command::Add(a, resp) => {
                        let _ = resp.send(surface.add(a));
                    }
                    Command::Update(id, patch, resp) => {
                        let _ = resp.send(surface.update(&id, patch));
                    }
                    Command::Delete(id, resp) => {
                        let _ = resp.send(surface.delete(&id));
                    }
                    Command::Clear(resp) => {
                        surface.clear();
                        let _ = resp.send(());
                    }
                    Command::Click(event, rect, resp) => {
                        let _ = resp.send(surface.click(event, rect));
                    }
                    Command::InsertAnalysis(items, resp) => {
                        let _ = resp.send(surface.insert_analysis(&items));
                    }
                    Command::List(resp) => {
                        let _ = resp.send(surface.annotations().to_vec());
                    }
                    Command::State(resp) => {
                        let _ = resp.send(surface.state().clone());
                    }
                    Command::Snapshot(resp) => {
                        let _ = resp.send(surface.snapshot());
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(());
                        break;
                    }
                }
            }
            log::debug!("surface worker exiting");
        });

        Self { cmd_tx, handle }
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::Other("surface worker has stopped".into()))
    }

    /// Shared handle to the rendered pixels, e.g. for an `Exporter`
    pub fn handle(&self) -> SurfaceHandle {
        self.handle.clone()
    }

    /// Request a new base image.
    ///
    /// Resolves once this particular load finishes. A load superseded by a
    /// later `load` call resolves to [`LoadOutcome::Stale`].
    pub async fn load(&self, source: ImageSource) -> Result<LoadOutcome> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Load(source, self.cmd_tx.clone(), tx))?;
        recv(rx, "Load").await?
    }

    pub async fn add(&self, annotation: Annotation) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Add(annotation, tx))?;
        recv(rx, "Add").await?
    }

    pub async fn update(&self, id: &str, patch: AnnotationPatch) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Update(id.to_string(), patch, tx))?;
        recv(rx, "Update").await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Delete(id.to_string(), tx))?;
        recv(rx, "Delete").await
    }

    pub async fn clear(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Clear(tx))?;
        recv(rx, "Clear").await
    }

    pub async fn click(
        &self,
        event: PointerEvent,
        rect: SurfaceRect,
    ) -> Result<Option<Annotation>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Click(event, rect, tx))?;
        recv(rx, "Click").await?
    }

    pub async fn insert_analysis(&self, items: Vec<AnalysisItem>) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::InsertAnalysis(items, tx))?;
        recv(rx, "InsertAnalysis").await?
    }

    pub async fn list(&self) -> Result<Vec<Annotation>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::List(tx))?;
        recv(rx, "List").await
    }

    pub async fn state(&self) -> Result<SurfaceState> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::State(tx))?;
        recv(rx, "State").await
    }

    pub async fn snapshot(&self) -> Result<Screenshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        recv(rx, "Snapshot").await?
    }

    /// Stop the worker thread. Loads still decoding are discarded.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Close(tx))?;
        recv(rx, "Close").await
    }
}
