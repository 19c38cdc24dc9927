use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

use facecam_core::capture::domain::camera_backend::CaptureConstraints;
use facecam_core::capture::domain::video_surface::VideoSurface;
use facecam_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use facecam_core::capture::media_capture::MediaCapture;
use facecam_core::detection::domain::detection_service::{DetectionParams, DetectionService};
use facecam_core::detection::infrastructure::http_detection_client::HttpDetectionClient;
use facecam_core::pipeline::capture_and_detect_use_case::CaptureAndDetectUseCase;
use facecam_core::pipeline::detect_with_escalation_use_case::DetectWithEscalationUseCase;
use facecam_core::realtime::realtime_detection_loop::{RealtimeConfig, RealtimeDetectionLoop};
use facecam_core::shared::captured_frame::CapturedFrame;
use facecam_core::shared::client_config::ClientConfig;
use facecam_core::shared::constants::{
    DEFAULT_API_BASE_URL, IMAGE_EXTENSIONS, MAX_CONFIDENCE, MIN_CONFIDENCE, SURFACE_READY_TIMEOUT,
};
use facecam_core::shared::detection_result::DetectionResult;
use facecam_core::shared::detection_summary::{format_percent, ResultSummary};

/// Client for a remote face detection service.
#[derive(Parser)]
#[command(name = "facecam")]
struct Cli {
    /// Base URL of the detection service.
    #[arg(long, global = true, default_value = DEFAULT_API_BASE_URL)]
    server: String,

    /// Request timeout in seconds.
    #[arg(long, global = true, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether the detection service is up.
    Health,
    /// Detect faces in an image file.
    Detect {
        input: PathBuf,
        #[command(flatten)]
        params: ParamArgs,
        /// Retry with other confidence thresholds while no faces are found.
        #[arg(long)]
        auto_adjust: bool,
        /// Print the raw JSON result instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Save a server-annotated copy of an image file.
    Annotate {
        input: PathBuf,
        /// Where to write the annotated image.
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Capture a still from the camera and detect faces in it.
    Capture {
        #[command(flatten)]
        camera: CameraArgs,
        #[command(flatten)]
        params: ParamArgs,
        /// Save the captured still.
        #[arg(long)]
        still: Option<PathBuf>,
        /// Save the annotated image when faces are found.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run continuous detection on the camera feed.
    Realtime {
        #[command(flatten)]
        camera: CameraArgs,
        #[command(flatten)]
        params: ParamArgs,
        /// Seconds to run for.
        #[arg(long, default_value = "10")]
        duration: u64,
    },
    /// List camera devices.
    Devices,
}

#[derive(Args)]
struct ParamArgs {
    /// Face detection confidence threshold (0.1-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Request emotion analysis.
    #[arg(long)]
    emotions: bool,

    /// Request age estimation.
    #[arg(long)]
    age: bool,
}

impl ParamArgs {
    fn to_params(&self) -> DetectionParams {
        DetectionParams {
            confidence: self.confidence,
            emotions: self.emotions,
            age: self.age,
        }
    }
}

#[derive(Args)]
struct CameraArgs {
    /// Camera device (defaults to the platform's first camera).
    #[arg(long)]
    device: Option<String>,
}

impl CameraArgs {
    fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            device: self.device.clone(),
            ..CaptureConstraints::default()
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = ClientConfig {
        timeout: Duration::from_secs(cli.timeout),
        ..ClientConfig::new(&cli.server)
    };

    match cli.command {
        Command::Health => run_health(&client(config)?),
        Command::Detect {
            input,
            params,
            auto_adjust,
            json,
        } => run_detect(client(config)?, &input, params.to_params(), auto_adjust, json),
        Command::Annotate {
            input,
            output,
            params,
        } => run_annotate(&client(config)?, &input, &output, params.to_params()),
        Command::Capture {
            camera,
            params,
            still,
            output,
        } => run_capture(
            client(config)?,
            camera.constraints(),
            params.to_params(),
            still.as_deref(),
            output.as_deref(),
        ),
        Command::Realtime {
            camera,
            params,
            duration,
        } => run_realtime(
            client(config)?,
            camera.constraints(),
            params.to_params(),
            Duration::from_secs(duration),
        ),
        Command::Devices => run_devices(),
    }
}

fn client(config: ClientConfig) -> Result<Arc<dyn DetectionService>, Box<dyn std::error::Error>> {
    log::debug!("Using detection service at {}", config.base_url);
    Ok(Arc::new(HttpDetectionClient::new(config)?))
}

fn run_health(client: &Arc<dyn DetectionService>) -> Result<(), Box<dyn std::error::Error>> {
    let status = client.health();
    let message = status.message.as_deref().unwrap_or("no details");
    if status.is_healthy() {
        println!("Server is healthy ({message})");
        Ok(())
    } else {
        Err(format!("Server is unhealthy: {message}").into())
    }
}

fn run_detect(
    client: Arc<dyn DetectionService>,
    input: &Path,
    params: DetectionParams,
    auto_adjust: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let frame = CapturedFrame::from_path(input)?;

    let result = if auto_adjust {
        let progress: Box<dyn Fn(u32, f64) -> bool + Send + Sync> =
            Box::new(|attempt, confidence| {
                if attempt > 0 {
                    eprintln!(
                        "No faces found, retrying at confidence {}",
                        format_percent(confidence)
                    );
                }
                true
            });
        let detection = DetectWithEscalationUseCase::new(client)
            .with_progress(progress)
            .execute(&frame, &params)?;
        log::info!(
            "Accepted result at confidence {:.1}",
            detection.confidence()
        );
        detection.result
    } else {
        client.detect(&frame, &params)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn run_annotate(
    client: &Arc<dyn DetectionService>,
    input: &Path,
    output: &Path,
    params: DetectionParams,
) -> Result<(), Box<dyn std::error::Error>> {
    let frame = CapturedFrame::from_path(input)?;
    let bytes = client.detect_and_annotate(&frame, &params)?;
    std::fs::write(output, bytes)?;
    log::info!("Annotated image written to {}", output.display());
    Ok(())
}

fn run_capture(
    client: Arc<dyn DetectionService>,
    constraints: CaptureConstraints,
    params: DetectionParams,
    still_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let capture = Arc::new(MediaCapture::new(Box::new(FfmpegCamera::new())));
    let surface = VideoSurface::new();
    let handle = capture.start(&constraints)?;
    capture.bind_to_surface(handle, &surface, SURFACE_READY_TIMEOUT)?;

    let progress: Box<dyn Fn(u32, f64) -> bool + Send + Sync> = Box::new(|attempt, confidence| {
        eprintln!(
            "Attempt {} at confidence {}",
            attempt + 1,
            format_percent(confidence)
        );
        true
    });
    let escalation = DetectWithEscalationUseCase::new(client.clone()).with_progress(progress);
    let use_case = CaptureAndDetectUseCase::new(capture.clone(), client, escalation);
    let outcome = use_case.execute(&surface, &params);
    capture.stop(handle);
    let outcome = outcome?;

    if let Some(path) = still_path {
        std::fs::write(path, outcome.still.data())?;
        log::info!("Still written to {}", path.display());
    }
    print_summary(&outcome.detection.result);

    match (output, outcome.annotated) {
        (Some(path), Some(bytes)) => {
            std::fs::write(path, bytes)?;
            log::info!("Annotated image written to {}", path.display());
        }
        (Some(_), None) => log::warn!("No annotated image to save"),
        _ => {}
    }
    Ok(())
}

fn run_realtime(
    client: Arc<dyn DetectionService>,
    constraints: CaptureConstraints,
    params: DetectionParams,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let capture = Arc::new(MediaCapture::new(Box::new(FfmpegCamera::new())));
    let config = RealtimeConfig {
        constraints,
        ..RealtimeConfig::default()
    };
    let realtime = RealtimeDetectionLoop::new(capture, client, VideoSurface::new(), config);
    realtime.set_params(params);
    realtime.start()?;

    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        thread::sleep(Duration::from_secs(1));
        let snapshot = realtime.snapshot();
        let faces = snapshot
            .face_count
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        let labels: Vec<&str> = snapshot.scene.labels().collect();
        eprintln!(
            "[{}] {} fps, faces: {faces} {}",
            snapshot.state,
            snapshot.fps,
            labels.join(", ")
        );
        if let Some(err) = snapshot.last_error {
            eprintln!("  last error: {err}");
        }
    }

    realtime.stop();
    Ok(())
}

fn run_devices() -> Result<(), Box<dyn std::error::Error>> {
    let capture = MediaCapture::new(Box::new(FfmpegCamera::new()));
    let devices = capture.list_devices()?;
    if devices.is_empty() {
        println!("No camera devices found");
    }
    for device in devices {
        println!("{}\t{}", device.id, device.name);
    }
    Ok(())
}

fn print_summary(result: &DetectionResult) {
    for line in ResultSummary::from_result(result).to_lines() {
        println!("{line}");
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.timeout == 0 {
        return Err("Timeout must be at least one second".into());
    }
    let (params, input) = match &cli.command {
        Command::Detect { input, params, .. } | Command::Annotate { input, params, .. } => {
            (Some(params), Some(input))
        }
        Command::Capture { params, .. } | Command::Realtime { params, .. } => (Some(params), None),
        Command::Health | Command::Devices => (None, None),
    };
    if let Some(params) = params {
        if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&params.confidence) {
            return Err(format!(
                "Confidence must be between {MIN_CONFIDENCE} and {MAX_CONFIDENCE}, got {}",
                params.confidence
            )
            .into());
        }
    }
    if let Some(input) = input {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
        if !is_image(input) {
            return Err(format!("Not a supported image file: {}", input.display()).into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
