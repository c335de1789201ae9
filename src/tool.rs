//! Camera OCR Tool Coordinator
//!
//! Wires the region picker, frame queue, recognition worker and result
//! channel together behind one object owned by the host. The host feeds it
//! preview frames, touch events and camera changes, and drains results on
//! its own thread with `deliver_pending`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::capture::{
    optimal_preview_size, CameraFacing, CameraGeometry, CameraHandle, CameraPose, Frame,
    FrameQueue,
};
use crate::config::ToolConfig;
use crate::dispatch::{CropListener, OcrListener, ResultDispatcher, ResultReceiver};
use crate::error::ToolError;
use crate::geometry::{Orientation, SelectionRect, Size};
use crate::picker::{DrawPrimitive, RegionPicker, TouchEvent};
use crate::storage::{self, PreviewSaver};
use crate::vision::{LanguageData, OcrEngine};
use crate::worker::{RecognitionWorker, WorkerContext, WorkerState};

/// Size of the view hosting the picker, in view pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostView {
    pub width: u32,
    pub height: u32,
}

impl HostView {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Everything needed to build a `CameraTool`
#[derive(Default)]
pub struct ToolSettings {
    /// Required; construction fails without it
    pub host: Option<HostView>,
    pub ocr_listener: Option<Box<dyn OcrListener + Send>>,
    pub crop_listener: Option<Box<dyn CropListener + Send>>,
    pub config: ToolConfig,
}

impl ToolSettings {
    pub fn new(host: HostView, config: ToolConfig) -> Self {
        Self {
            host: Some(host),
            config,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<HostView, ToolError> {
        let host = self
            .host
            .ok_or(ToolError::Precondition("a host view is required"))?;
        validate_host(host)?;

        if self.config.picker.divider <= 0 {
            return Err(ToolError::InvalidConfig(format!(
                "picker divider must be positive, got {}",
                self.config.picker.divider
            )));
        }
        validate_padding(host, self.config.picker.padding)?;
        if self.config.ocr.language.trim().is_empty() {
            return Err(ToolError::InvalidConfig("OCR language is empty".to_string()));
        }
        if self.config.debug.save_previews && self.config.debug.max_saved == 0 {
            return Err(ToolError::InvalidConfig(
                "save_previews needs max_saved > 0".to_string(),
            ));
        }

        Ok(host)
    }
}

fn validate_host(host: HostView) -> Result<(), ToolError> {
    if host.width == 0 || host.height == 0 {
        return Err(ToolError::InvalidConfig(format!(
            "host view has zero size ({}x{})",
            host.width, host.height
        )));
    }
    Ok(())
}

/// The padded area must leave room for a rectangle of positive size
fn validate_padding(host: HostView, padding: i32) -> Result<(), ToolError> {
    if padding < 0 {
        return Err(ToolError::InvalidConfig(format!(
            "picker padding must not be negative, got {}",
            padding
        )));
    }
    let short_side = i64::from(host.width.min(host.height));
    if 2 * i64::from(padding) >= short_side {
        return Err(ToolError::InvalidConfig(format!(
            "picker padding {} leaves no room in a {}x{} view",
            padding, host.width, host.height
        )));
    }
    Ok(())
}

/// Live-camera OCR pipeline
pub struct CameraTool {
    config: ToolConfig,
    host: HostView,
    data_dir: PathBuf,
    picker: RegionPicker,
    queue: Arc<FrameQueue>,
    camera: CameraHandle,
    pose: CameraPose,
    worker: RecognitionWorker,
    results: ResultReceiver,
    ocr_listener: Option<Box<dyn OcrListener + Send>>,
    crop_listener: Option<Box<dyn CropListener + Send>>,
}

impl CameraTool {
    /// Validate `settings` and build a stopped pipeline around `engine`
    pub fn new(settings: ToolSettings, engine: Box<dyn OcrEngine>) -> Result<Self, ToolError> {
        let host = settings.validate()?;
        let ToolSettings {
            ocr_listener,
            crop_listener,
            config,
            ..
        } = settings;

        let data_dir = match &config.ocr.data_dir {
            Some(dir) => dir.clone(),
            None => storage::get_data_dir().map_err(|e| {
                ToolError::InvalidConfig(format!("cannot resolve data directory: {}", e))
            })?,
        };

        let saver = if config.debug.save_previews {
            let dir = config
                .debug
                .dir
                .clone()
                .unwrap_or_else(|| data_dir.join("previews"));
            Some(PreviewSaver::new(dir, config.debug.max_saved)?)
        } else {
            None
        };

        let mut picker = RegionPicker::new(&config.picker);
        picker.set_resize_listener(Box::new(|rect: &SelectionRect| {
            debug!(
                "Selection resized to {}x{} at ({}, {})",
                rect.width, rect.height, rect.x, rect.y
            );
        }));
        picker.layout(host.width as i32, host.height as i32);

        let pose = CameraPose {
            device_rotation: Orientation::Deg0,
            sensor_mount_angle: config.camera.sensor_mount_angle,
            facing: config.camera.facing,
        };
        let camera = CameraHandle::new(CameraGeometry {
            preview_size: None,
            orientation: pose.orientation(),
        });

        let queue = Arc::new(FrameQueue::new(config.ocr.queue_size));
        let (dispatcher, results) = ResultDispatcher::channel();

        let worker = RecognitionWorker::new(
            engine,
            WorkerContext {
                queue: queue.clone(),
                selection: picker.handle(),
                camera: camera.clone(),
                dispatcher,
                saver,
            },
            data_dir.clone(),
            config.ocr.language.clone(),
        );

        info!(
            "Camera tool ready: host {}x{}, {:?} camera, language '{}'",
            host.width, host.height, config.camera.facing, config.ocr.language
        );

        Ok(Self {
            config,
            host,
            data_dir,
            picker,
            queue,
            camera,
            pose,
            worker,
            results,
            ocr_listener,
            crop_listener,
        })
    }

    /// Provision language data, then start the recognition worker
    pub fn start_ocr(&mut self) -> Result<(), ToolError> {
        LanguageData::new(&self.data_dir).ensure(
            &self.config.ocr.language,
            self.config.ocr.bundled_data_dir.as_deref(),
        )?;
        self.worker.start()
    }

    /// Ask the worker to stop and drop queued frames; does not wait
    pub fn stop_ocr(&mut self) {
        self.worker.stop();
        let cleared = self.queue.clear();
        if cleared > 0 {
            debug!("Discarded {} queued frames on stop", cleared);
        }
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(&mut self) {
        self.worker.shutdown();
        self.queue.clear();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Camera callback entry point. Frames arriving while OCR is not
    /// running are ignored; returns whether the frame was queued.
    pub fn on_preview_frame(&self, data: Vec<u8>, width: u32, height: u32) -> bool {
        self.push_frame(Frame::new(data, width, height))
    }

    pub fn push_frame(&self, frame: Frame) -> bool {
        if !self.worker.is_running() {
            return false;
        }
        self.queue.push(frame);
        true
    }

    /// Forward a touch event to the picker; true if the selection changed
    pub fn on_touch_event(&mut self, event: TouchEvent) -> bool {
        self.picker.on_touch_event(event)
    }

    /// Set the selection directly; false if it does not fit the view
    pub fn set_selection(&mut self, x: i32, y: i32, width: i32, height: i32) -> bool {
        self.picker.set_selection(x, y, width, height)
    }

    pub fn set_device_rotation(&mut self, rotation: Orientation) {
        self.pose.device_rotation = rotation;
        self.update_orientation();
    }

    /// Switch to another camera
    pub fn set_facing(&mut self, facing: CameraFacing, sensor_mount_angle: i32) {
        self.pose.facing = facing;
        self.pose.sensor_mount_angle = sensor_mount_angle;
        self.update_orientation();
    }

    fn update_orientation(&self) {
        let orientation = self.pose.orientation();
        self.camera.set_orientation(orientation);
        info!("Camera orientation is now {} degrees", orientation.degrees());
    }

    /// Active preview resolution of the camera
    pub fn set_preview_size(&self, size: Size) {
        debug!("Preview size {}x{}", size.width, size.height);
        self.camera.set_preview_size(size);
    }

    /// Choose the supported size best matching the host view and make it
    /// the active preview resolution
    pub fn fit_preview(&self, sizes: &[Size]) -> Option<Size> {
        let size = optimal_preview_size(sizes, self.host.width, self.host.height)?;
        self.set_preview_size(size);
        Some(size)
    }

    pub fn orientation(&self) -> Orientation {
        self.camera.snapshot().orientation
    }

    pub fn camera_geometry(&self) -> CameraGeometry {
        self.camera.snapshot()
    }

    /// Host view was resized
    pub fn relayout(&mut self, host: HostView) -> Result<(), ToolError> {
        validate_host(host)?;
        validate_padding(host, self.config.picker.padding)?;
        self.host = host;
        self.picker.layout(host.width as i32, host.height as i32);
        Ok(())
    }

    pub fn host(&self) -> HostView {
        self.host
    }

    pub fn selection(&self) -> SelectionRect {
        self.picker.selection()
    }

    pub fn draw_primitives(&self) -> Vec<DrawPrimitive> {
        self.picker.draw()
    }

    pub fn take_redraw_request(&mut self) -> bool {
        self.picker.take_redraw_request()
    }

    /// Hand waiting results to the registered listeners, in order
    pub fn deliver_pending(&mut self) -> usize {
        let ocr = self
            .ocr_listener
            .as_mut()
            .map(|l| l.as_mut() as &mut (dyn OcrListener + Send));
        let crop = self
            .crop_listener
            .as_mut()
            .map(|l| l.as_mut() as &mut (dyn CropListener + Send));
        self.results.deliver(ocr, crop)
    }

    /// Result channel, for hosts that poll instead of using listeners
    pub fn results(&self) -> ResultReceiver {
        self.results.clone()
    }

    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.queue.dropped_frames()
    }

    pub fn processed_frames(&self) -> u64 {
        self.worker.processed_frames()
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }
}

impl Drop for CameraTool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::OcrError;
    use image::{Rgb, RgbImage};
    use parking_lot::Mutex;
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    struct EchoEngine;

    impl OcrEngine for EchoEngine {
        fn initialize(&mut self, _data_path: &Path, _language: &str) -> Result<(), OcrError> {
            Ok(())
        }
        fn set_image(&mut self, _image: &RgbImage) -> Result<(), OcrError> {
            Ok(())
        }
        fn text(&mut self) -> Result<String, OcrError> {
            Ok("Total: 12.50".to_string())
        }
        fn confidence(&mut self) -> Result<f32, OcrError> {
            Ok(0.9)
        }
        fn reset(&mut self) {}
        fn shutdown(&mut self) {}
    }

    #[derive(Clone, Default)]
    struct Collected(Arc<Mutex<Vec<String>>>);

    impl OcrListener for Collected {
        fn on_text_recognized(&mut self, text: &str, _confidence: f32) {
            self.0.lock().push(text.to_string());
        }
    }

    impl CropListener for Collected {
        fn on_crop_preview(&mut self, image: &RgbImage) {
            self.0
                .lock()
                .push(format!("{}x{}", image.width(), image.height()));
        }
    }

    fn build(host: HostView, config: ToolConfig) -> Result<CameraTool, ToolError> {
        CameraTool::new(ToolSettings::new(host, config), Box::new(EchoEngine))
    }

    /// Config rooted in `dir`, with `eng.traineddata` already provisioned
    fn config_in(dir: &TempDir) -> ToolConfig {
        let mut config = ToolConfig::default();
        config.ocr.data_dir = Some(dir.path().to_path_buf());
        config.camera.sensor_mount_angle = 0;
        let tessdata = dir.path().join("tessdata");
        std::fs::create_dir_all(&tessdata).unwrap();
        std::fs::write(tessdata.join("eng.traineddata"), b"model").unwrap();
        config
    }

    #[test]
    fn test_missing_host_is_precondition() {
        let settings = ToolSettings::default();
        let result = CameraTool::new(settings, Box::new(EchoEngine));
        assert!(matches!(result, Err(ToolError::Precondition(_))));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let dir = TempDir::new().unwrap();

        let mut config = config_in(&dir);
        config.picker.divider = 0;
        let result = build(HostView::new(100, 100), config);
        assert!(matches!(result, Err(ToolError::InvalidConfig(_))));

        let config = config_in(&dir);
        let result = build(HostView::new(0, 100), config);
        assert!(matches!(result, Err(ToolError::InvalidConfig(_))));

        let mut config = config_in(&dir);
        config.ocr.language = String::new();
        let result = build(HostView::new(100, 100), config);
        assert!(matches!(result, Err(ToolError::InvalidConfig(_))));

        let mut config = config_in(&dir);
        config.debug.save_previews = true;
        config.debug.max_saved = 0;
        let result = build(HostView::new(100, 100), config);
        assert!(matches!(result, Err(ToolError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_language_data_fails_start() {
        let dir = TempDir::new().unwrap();
        let mut config = ToolConfig::default();
        config.ocr.data_dir = Some(dir.path().to_path_buf());

        let mut tool = build(HostView::new(100, 100), config).unwrap();
        assert!(matches!(tool.start_ocr(), Err(ToolError::MissingLanguageData(_))));
        assert!(!tool.is_running());
    }

    #[test]
    fn test_frames_ignored_until_started() {
        let dir = TempDir::new().unwrap();
        let tool = build(HostView::new(100, 100), config_in(&dir)).unwrap();

        assert!(!tool.on_preview_frame(vec![0; 15_000], 100, 100));
        assert_eq!(tool.queued_frames(), 0);
    }

    #[test]
    fn test_end_to_end_delivery() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.debug.save_previews = true;
        config.debug.max_saved = 2;

        let collected = Collected::default();
        let settings = ToolSettings {
            host: Some(HostView::new(100, 100)),
            ocr_listener: Some(Box::new(collected.clone())),
            crop_listener: Some(Box::new(collected.clone())),
            config,
        };
        let mut tool = CameraTool::new(settings, Box::new(EchoEngine)).unwrap();
        tool.start_ocr().unwrap();
        assert!(tool.is_running());

        // Shrink the selection from the bottom-right handle
        tool.on_touch_event(TouchEvent::down(100, 100));
        assert!(tool.on_touch_event(TouchEvent::moved(50, 60)));
        assert_eq!(tool.selection().width, 50);
        assert!(tool.take_redraw_request());

        let frame = Frame::from_rgb(&RgbImage::from_pixel(100, 100, Rgb([200, 200, 200])));
        assert!(tool.push_frame(frame));

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut delivered = 0;
        while delivered < 2 && Instant::now() < deadline {
            delivered += tool.deliver_pending();
            std::thread::sleep(Duration::from_millis(5));
        }

        tool.shutdown();
        assert_eq!(*collected.0.lock(), vec!["50x60", "Total 12 50"]);
        assert!(dir.path().join("previews").join("preview-0.jpg").is_file());
    }

    #[test]
    fn test_orientation_follows_rotation_and_facing() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.camera.sensor_mount_angle = 90;
        let mut tool = build(HostView::new(480, 640), config).unwrap();

        assert_eq!(tool.orientation(), Orientation::Deg90);
        tool.set_device_rotation(Orientation::Deg90);
        assert_eq!(tool.orientation(), Orientation::Deg0);
        tool.set_facing(CameraFacing::Front, 270);
        // (360 - (270 + 90) % 360) % 360
        assert_eq!(tool.orientation(), Orientation::Deg0);
        tool.set_device_rotation(Orientation::Deg0);
        assert_eq!(tool.orientation(), Orientation::Deg90);
    }

    #[test]
    fn test_fit_preview_sets_resolution() {
        let dir = TempDir::new().unwrap();
        let tool = build(HostView::new(480, 640), config_in(&dir)).unwrap();

        let sizes = [Size::new(320, 240), Size::new(640, 480), Size::new(1280, 720)];
        assert_eq!(tool.fit_preview(&sizes), Some(Size::new(640, 480)));
        assert_eq!(tool.camera_geometry().preview_size, Some(Size::new(640, 480)));
        assert_eq!(tool.fit_preview(&[]), None);
    }

    #[test]
    fn test_relayout_rejects_empty_host() {
        let dir = TempDir::new().unwrap();
        let mut tool = build(HostView::new(200, 100), config_in(&dir)).unwrap();

        assert!(tool.relayout(HostView::new(0, 50)).is_err());
        tool.relayout(HostView::new(80, 80)).unwrap();
        assert!(tool.selection().is_valid());
        assert_eq!(tool.selection().bound_width, 80);
    }

    #[test]
    fn test_padding_must_leave_room_for_selection() {
        let dir = TempDir::new().unwrap();

        let mut config = config_in(&dir);
        config.picker.padding = 60;
        let result = build(HostView::new(100, 100), config);
        assert!(matches!(result, Err(ToolError::InvalidConfig(_))));

        // Exactly half the short side leaves a zero-sized rectangle
        let mut config = config_in(&dir);
        config.picker.padding = 50;
        let result = build(HostView::new(300, 100), config);
        assert!(matches!(result, Err(ToolError::InvalidConfig(_))));

        let mut config = config_in(&dir);
        config.picker.padding = 49;
        let tool = build(HostView::new(300, 100), config).unwrap();
        assert!(tool.selection().is_valid());
        assert_eq!(tool.selection().width, 2);
    }

    #[test]
    fn test_relayout_rejects_host_too_small_for_padding() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.picker.padding = 10;
        let mut tool = build(HostView::new(100, 100), config).unwrap();
        let before = tool.selection();

        let result = tool.relayout(HostView::new(15, 15));
        assert!(matches!(result, Err(ToolError::InvalidConfig(_))));
        assert_eq!(tool.selection(), before);
        assert_eq!(tool.host(), HostView::new(100, 100));
        assert!(tool.selection().is_valid());
    }
}
