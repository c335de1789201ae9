//! PreviewOCR - replay a directory of images through the OCR pipeline
//!
//! Each image is encoded as an NV21 preview frame and pushed at the
//! configured frame rate, exactly as a camera callback would.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use image::imageops::{self, FilterType};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use preview_ocr::capture::replay::ReplaySource;
use preview_ocr::config::{self, ToolConfig};
use preview_ocr::geometry::transform::rotate;
use preview_ocr::picker::rasterize;
use preview_ocr::storage;
use preview_ocr::{
    CameraFacing, CameraTool, HostView, OcrListener, OcrResult, Orientation, TesseractEngine,
    ToolSettings,
};

/// Wait this long without results before declaring the replay finished
const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// PreviewOCR - live camera preview text recognition
#[derive(Parser, Debug)]
#[command(name = "preview-ocr")]
#[command(about = "Replay images as camera frames and print the text found in the selection")]
struct Args {
    /// Directory of images to replay as preview frames
    input: PathBuf,

    /// Configuration file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host view size the selection is expressed in
    #[arg(long, value_name = "WxH", default_value = "480x640", value_parser = parse_view)]
    view: HostView,

    /// Initial selection in view pixels
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_selection)]
    selection: Option<[i32; 4]>,

    /// Device rotation in degrees (0, 90, 180, 270)
    #[arg(long, default_value = "0", value_parser = parse_rotation)]
    rotation: Orientation,

    /// Camera facing, overriding the config
    #[arg(long, value_enum)]
    facing: Option<FacingArg>,

    /// Sensor mount angle, overriding the config
    #[arg(long)]
    mount_angle: Option<i32>,

    /// Save crop previews, rotating through N files
    #[arg(long, value_name = "N")]
    save: Option<u32>,

    /// Write the first frame with the selection drawn on it
    #[arg(long, value_name = "PATH")]
    overlay: Option<PathBuf>,

    /// Print one JSON object per recognized text
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FacingArg {
    Front,
    Back,
}

impl From<FacingArg> for CameraFacing {
    fn from(arg: FacingArg) -> Self {
        match arg {
            FacingArg::Front => CameraFacing::Front,
            FacingArg::Back => CameraFacing::Back,
        }
    }
}

fn parse_view(s: &str) -> Result<HostView, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{}'", s))?;
    let width = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let height = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    Ok(HostView::new(width, height))
}

fn parse_selection(s: &str) -> Result<[i32; 4], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<i32>().map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    values
        .try_into()
        .map_err(|_| format!("expected X,Y,W,H, got '{}'", s))
}

fn parse_rotation(s: &str) -> Result<Orientation, String> {
    let degrees = s.trim().parse::<i32>().map_err(|e| e.to_string())?;
    if degrees.rem_euclid(90) != 0 {
        return Err(format!("rotation must be a multiple of 90, got {}", degrees));
    }
    Ok(Orientation::from_degrees(degrees))
}

/// Prints recognized text to stdout
struct StdoutListener {
    json: bool,
}

impl OcrListener for StdoutListener {
    fn on_text_recognized(&mut self, text: &str, confidence: f32) {
        if self.json {
            let result = OcrResult {
                text: text.to_string(),
                confidence,
            };
            match serde_json::to_string(&result) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to encode result: {}", e),
            }
        } else {
            println!("[{:.2}] {}", confidence, text.trim());
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("PreviewOCR starting...");

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => load_or_create_config(),
    };
    if let Some(facing) = args.facing {
        config.camera.facing = facing.into();
    }
    if let Some(angle) = args.mount_angle {
        config.camera.sensor_mount_angle = angle;
    }
    if let Some(limit) = args.save {
        config.debug.save_previews = true;
        config.debug.max_saved = limit;
    }

    let mut source = ReplaySource::from_dir(&args.input)?;
    if source.is_empty() {
        bail!("No images found in {:?}", args.input);
    }

    let max_fps = config.camera.max_fps.max(1);
    let engine = TesseractEngine::new();
    let settings = ToolSettings {
        host: Some(args.view),
        ocr_listener: Some(Box::new(StdoutListener { json: args.json })),
        crop_listener: None,
        config,
    };
    let mut tool = CameraTool::new(settings, Box::new(engine))?;

    tool.set_device_rotation(args.rotation);
    if let Some(size) = tool.fit_preview(&source.supported_sizes()) {
        info!("Preview size {}x{}", size.width, size.height);
    }
    if let Some([x, y, width, height]) = args.selection {
        if !tool.set_selection(x, y, width, height) {
            warn!(
                "Selection {},{},{},{} does not fit the {}x{} view, keeping {:?}",
                x,
                y,
                width,
                height,
                args.view.width,
                args.view.height,
                tool.selection()
            );
        }
    }

    if let Some(path) = &args.overlay {
        write_overlay(&tool, &mut source, path)?;
    }

    tool.start_ocr()
        .context("Failed to start OCR (is the language data installed?)")?;

    let frame_interval = Duration::from_secs_f64(1.0 / max_fps as f64);
    let mut pushed = 0usize;
    while let Some(frame) = source.next_frame() {
        let deadline = Instant::now() + frame_interval;
        if tool.push_frame(frame) {
            pushed += 1;
        }
        while Instant::now() < deadline {
            tool.deliver_pending();
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    // Drain until the worker has been quiet for a while
    let mut last_activity = Instant::now();
    loop {
        if tool.deliver_pending() > 0 {
            last_activity = Instant::now();
        }
        if tool.queued_frames() == 0 && last_activity.elapsed() >= IDLE_TIMEOUT {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    tool.shutdown();
    tool.deliver_pending();

    info!(
        "Replay finished: {} frames pushed, {} recognized, {} dropped",
        pushed,
        tool.processed_frames(),
        tool.dropped_frames()
    );

    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config() -> ToolConfig {
    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return config;
                }
                Err(e) => warn!("Ignoring configuration {:?}: {:#}", config_path, e),
            }
        } else if let Err(e) = config::save_config(&ToolConfig::default(), &config_path) {
            warn!("Failed to write default configuration: {}", e);
        } else {
            info!("Wrote default configuration to {:?}", config_path);
        }
    }
    info!("Using default configuration");
    ToolConfig::default()
}

/// Draw the picker over the first frame, scaled to the view
fn write_overlay(tool: &CameraTool, source: &mut ReplaySource, path: &Path) -> Result<()> {
    let frame = source
        .next_frame()
        .context("No readable frame for the overlay")?;
    source.rewind();

    let decoded = frame.to_rgb()?;
    let rotated = rotate(&decoded, tool.orientation());
    let host = tool.host();
    let mut canvas = imageops::resize(&rotated, host.width, host.height, FilterType::Triangle);

    rasterize(&tool.draw_primitives(), &mut canvas);
    canvas
        .save(path)
        .with_context(|| format!("Failed to write overlay {:?}", path))?;
    info!("Wrote selection overlay to {:?}", path);
    Ok(())
}
