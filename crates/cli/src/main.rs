use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::Parser;

use vision_track_core::capture::domain::frame_source::FrameSource;
use vision_track_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use vision_track_core::detection::infrastructure::replay_backend::{ReplayBackend, ReplayScript};
use vision_track_core::pipeline::annotate_sequence_use_case::AnnotateSequenceUseCase;
use vision_track_core::pipeline::detection_pipeline::DetectionPipeline;
use vision_track_core::pipeline::infrastructure::threaded_session::ThreadedSession;
use vision_track_core::pipeline::observation_snapshot::WaitOutcome;
use vision_track_core::pipeline::pipeline_logger::SummaryPipelineLogger;
use vision_track_core::presentation::domain::face_orientation_summary::FaceOrientationSummary;
use vision_track_core::presentation::infrastructure::box_overlay_renderer::BoxOverlayRenderer;
use vision_track_core::presentation::infrastructure::image_file_writer::ImageFileWriter;
use vision_track_core::shared::constants::{
    DEFAULT_STROKE_WIDTH, MAX_CAPTURE_FPS, MIN_CAPTURE_FPS,
};
use vision_track_core::shared::orientation::DeviceOrientation;
use vision_track_core::shared::settings::{PipelineMode, Settings};

const SNAPSHOT_POLL: Duration = Duration::from_millis(200);

/// Face and rectangle detection overlays over a frame sequence.
#[derive(Parser)]
#[command(name = "vision-track")]
struct Cli {
    /// Directory of frames, read in file name order.
    frames: PathBuf,

    /// Replay script with the backend's per-frame observations (JSON).
    #[arg(long)]
    script: PathBuf,

    /// Write annotated frames here instead of running a live session.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Device orientation the frames were captured in.
    #[arg(long, default_value = "portrait")]
    orientation: DeviceOrientation,

    /// Pipeline mode: track or detect.
    #[arg(long)]
    mode: Option<PipelineMode>,

    /// Detections must score above this to start a track (0.0-1.0).
    #[arg(long)]
    creation_threshold: Option<f64>,

    /// Skip the per-track pose refinement after tracking.
    #[arg(long)]
    no_refine: bool,

    /// Frame rate of the simulated camera in live mode.
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Outline width in pixels for annotated frames.
    #[arg(long, default_value_t = DEFAULT_STROKE_WIDTH)]
    stroke_width: u32,

    /// Settings file (defaults to the platform config directory).
    #[arg(long)]
    settings: Option<PathBuf>,
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

    let settings = resolve_settings(&cli)?;
    log::info!(
        "Mode {}, creation threshold {}, refinement {}",
        settings.pipeline.mode,
        settings.pipeline.creation_threshold,
        if settings.pipeline.refine_after_tracking {
            "on"
        } else {
            "off"
        }
    );

    let script = ReplayScript::from_file(&cli.script)?;
    let pipeline = DetectionPipeline::new(
        Box::new(ReplayBackend::new(script)),
        settings.pipeline.clone(),
    )
    .with_logger(Box::new(SummaryPipelineLogger::new(settings.log_every_frames)));

    match cli.output_dir {
        Some(ref output_dir) => run_annotate(&cli, output_dir, pipeline),
        None => run_live(&cli, pipeline),
    }
}

fn run_annotate(
    cli: &Cli,
    output_dir: &Path,
    pipeline: DetectionPipeline,
) -> Result<(), Box<dyn std::error::Error>> {
    let source: Box<dyn FrameSource> =
        Box::new(ImageSequenceSource::new(&cli.frames, cli.orientation));

    let progress: Box<dyn Fn(usize) -> bool + Send> = Box::new(|done| {
        eprint!("\rAnnotating frame {done}");
        true
    });

    let mut use_case = AnnotateSequenceUseCase::new(
        source,
        pipeline,
        Box::new(BoxOverlayRenderer::new(cli.stroke_width).with_last_frame_highlight()),
        Box::new(ImageFileWriter::new()),
    )
    .with_progress(progress);
    let reports = use_case.execute(output_dir)?;
    eprintln!();

    let failures = reports.iter().filter(|r| r.backend_failed).count();
    log::info!(
        "Wrote {} frame(s) to {} ({failures} backend failure(s))",
        reports.len(),
        output_dir.display()
    );
    Ok(())
}

fn run_live(cli: &Cli, pipeline: DetectionPipeline) -> Result<(), Box<dyn std::error::Error>> {
    let source: Box<dyn FrameSource> = Box::new(
        ImageSequenceSource::new(&cli.frames, cli.orientation).with_fps(cli.fps),
    );
    let session = ThreadedSession::start(source, pipeline)?;
    let snapshots = session.snapshots();

    loop {
        match snapshots.wait_for_update(SNAPSHOT_POLL) {
            WaitOutcome::Updated(snapshot) => {
                println!("{}", serde_json::to_string(snapshot.as_ref())?);
                if let Some(summary) = FaceOrientationSummary::from_updates(&snapshot.updates) {
                    eprintln!("frame {}: {summary}", snapshot.frame_index);
                }
            }
            WaitOutcome::TimedOut if session.is_finished() => break,
            WaitOutcome::TimedOut => {}
            WaitOutcome::Closed => break,
        }
    }

    let stopped = session.wait()?;
    stopped.pipeline.logger().summary();
    let counts = stopped.counts;
    log::info!(
        "{} frame(s) captured, {} processed, {} dropped",
        counts.submitted,
        counts.processed,
        counts.dropped
    );
    Ok(())
}

fn resolve_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match cli.settings {
        Some(ref path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if let Some(mode) = cli.mode {
        settings.pipeline.mode = mode;
    }
    if let Some(threshold) = cli.creation_threshold {
        settings.pipeline.creation_threshold = threshold;
    }
    if cli.no_refine {
        settings.pipeline.refine_after_tracking = false;
    }
    settings.validate()?;
    Ok(settings)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.frames.is_dir() {
        return Err(format!("Frames directory not found: {}", cli.frames.display()).into());
    }
    if !cli.script.is_file() {
        return Err(format!("Replay script not found: {}", cli.script.display()).into());
    }
    if let Some(threshold) = cli.creation_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(format!(
                "Creation threshold must be between 0.0 and 1.0, got {threshold}"
            )
            .into());
        }
    }
    if !(MIN_CAPTURE_FPS..=MAX_CAPTURE_FPS).contains(&cli.fps) {
        return Err(format!(
            "FPS must be between {MIN_CAPTURE_FPS} and {MAX_CAPTURE_FPS}, got {}",
            cli.fps
        )
        .into());
    }
    if cli.stroke_width == 0 {
        return Err("Stroke width must be at least 1".into());
    }
    Ok(())
}
