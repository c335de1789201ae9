//! Background OCR worker
//!
//! One dedicated thread takes frames off the `FrameQueue`, crops the current
//! selection out of each one and feeds it to the OCR engine. The engine is
//! moved into the thread while running and handed back when it exits, so a
//! stopped worker can be started again with the same engine.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::capture::{CameraHandle, Frame, FrameQueue};
use crate::dispatch::ResultDispatcher;
use crate::error::{FrameError, ToolError};
use crate::geometry::map_selection_to_sensor;
use crate::geometry::transform::crop_and_rotate;
use crate::picker::SelectionHandle;
use crate::storage::PreviewSaver;
use crate::vision::{normalize_text, OcrEngine};

/// Lifecycle of the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Running,
    /// Stop requested, thread still finishing its current frame
    Stopping,
}

/// Shared state the worker reads on every frame
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<FrameQueue>,
    pub selection: SelectionHandle,
    pub camera: CameraHandle,
    pub dispatcher: ResultDispatcher,
    /// Debug copies of each crop
    pub saver: Option<PreviewSaver>,
}

/// What the thread hands back on exit
struct Parts {
    engine: Box<dyn OcrEngine>,
    saver: Option<PreviewSaver>,
}

/// Owns the OCR engine and the thread that drives it
pub struct RecognitionWorker {
    context: WorkerContext,
    data_path: PathBuf,
    language: String,
    engine: Option<Box<dyn OcrEngine>>,
    running: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    handle: Option<JoinHandle<Parts>>,
    exited: Option<Receiver<()>>,
}

impl RecognitionWorker {
    /// Create a stopped worker. The engine is initialized from
    /// `data_path` / `language` on every `start`.
    pub fn new(
        engine: Box<dyn OcrEngine>,
        context: WorkerContext,
        data_path: impl Into<PathBuf>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            context,
            data_path: data_path.into(),
            language: language.into(),
            engine: Some(engine),
            running: Arc::new(AtomicBool::new(false)),
            processed: Arc::new(AtomicU64::new(0)),
            handle: None,
            exited: None,
        }
    }

    /// Initialize the engine and spawn the worker thread.
    ///
    /// Does nothing if already running. A worker that is still stopping is
    /// joined first.
    pub fn start(&mut self) -> Result<(), ToolError> {
        if self.handle.is_some() {
            if self.running.load(Ordering::Acquire) {
                debug!("OCR worker already running");
                return Ok(());
            }
            self.join();
        }

        let mut engine = self
            .engine
            .take()
            .ok_or(ToolError::Precondition("OCR engine was lost by a previous run"))?;

        if let Err(e) = engine.initialize(&self.data_path, &self.language) {
            error!("OCR engine initialization failed: {}", e);
            self.engine = Some(engine);
            return Err(ToolError::EngineInit(e));
        }

        // Drop any wake-up left over from the previous stop
        self.context.queue.clear_interrupt();
        self.running.store(true, Ordering::Release);

        let (exit_tx, exit_rx) = bounded(1);
        let job = Job {
            context: self.context.clone(),
            running: self.running.clone(),
            processed: self.processed.clone(),
            exit_tx,
        };

        let spawned = std::thread::Builder::new()
            .name("ocr-worker".to_string())
            .spawn(move || job.run(engine));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                self.exited = Some(exit_rx);
                info!("OCR worker started (language '{}')", self.language);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(ToolError::Io(e))
            }
        }
    }

    /// Ask the thread to exit after its current frame; does not wait
    pub fn stop(&self) {
        if self.handle.is_none() {
            return;
        }
        info!("Stopping OCR worker");
        self.running.store(false, Ordering::Release);
        self.context.queue.interrupt();
    }

    /// Wait up to `timeout` for the thread to exit. Returns true once it has
    /// been joined (or was never running).
    pub fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let Some(exited) = self.exited.as_ref() else {
            return true;
        };

        match exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.join();
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Stop and join, however long the current frame takes
    pub fn shutdown(&mut self) {
        self.stop();
        self.join();
    }

    pub fn state(&self) -> WorkerState {
        match &self.handle {
            None => WorkerState::Stopped,
            Some(_) if self.running.load(Ordering::Acquire) => WorkerState::Running,
            Some(handle) if handle.is_finished() => WorkerState::Stopped,
            Some(_) => WorkerState::Stopping,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Frames that produced a text result since creation
    pub fn processed_frames(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    fn join(&mut self) {
        self.exited = None;
        let Some(handle) = self.handle.take() else {
            return;
        };

        match handle.join() {
            Ok(parts) => {
                self.engine = Some(parts.engine);
                self.context.saver = parts.saver;
                debug!("OCR worker joined");
            }
            Err(_) => error!("OCR worker thread panicked; engine discarded"),
        }
    }
}

impl Drop for RecognitionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State moved into the worker thread
struct Job {
    context: WorkerContext,
    running: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    exit_tx: Sender<()>,
}

impl Job {
    fn run(mut self, mut engine: Box<dyn OcrEngine>) -> Parts {
        info!("OCR worker thread starting...");

        while self.running.load(Ordering::Acquire) {
            let Some(frame) = self.context.queue.take_next() else {
                continue;
            };
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            match self.process(engine.as_mut(), &frame) {
                Ok(()) => {
                    self.processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!("Skipping frame: {}", e),
            }
        }

        engine.reset();
        engine.shutdown();
        info!("OCR worker thread exiting...");

        let _ = self.exit_tx.send(());
        Parts {
            engine,
            saver: self.context.saver.take(),
        }
    }

    fn process(&mut self, engine: &mut dyn OcrEngine, frame: &Frame) -> Result<(), FrameError> {
        let selection = self.context.selection.snapshot();
        let camera = self.context.camera.snapshot();
        let sensor = camera.preview_size.unwrap_or_else(|| frame.size());

        let crop = map_selection_to_sensor(
            &selection,
            selection.bound_size(),
            sensor,
            camera.orientation,
        );
        if crop.is_empty() {
            return Err(FrameError::EmptyCrop);
        }

        let image = crop_and_rotate(frame, camera.orientation, crop)?;

        self.context.dispatcher.post_preview(image.clone());
        if let Some(saver) = self.context.saver.as_mut() {
            saver.save(&image);
        }

        engine.reset();
        engine.set_image(&image)?;
        let text = engine.text()?;
        let confidence = engine.confidence()?;

        self.context
            .dispatcher
            .post_text(normalize_text(&text), confidence);
        Ok(())
    }
}
