use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use blurfaces_core::detection::domain::face_capability::FaceCapability;
use blurfaces_core::detection::infrastructure::onnx_face_capability::OnnxFaceCapability;
use blurfaces_core::jobs::domain::job::JobStatus;
use blurfaces_core::jobs::domain::job_request::JobRequest;
use blurfaces_core::jobs::domain::video_processor::VideoProcessor;
use blurfaces_core::jobs::infrastructure::ffmpeg_video_processor::FfmpegVideoProcessor;
use blurfaces_core::jobs::job_manager::{JobManager, JobManagerConfig};
use blurfaces_core::shared::model_resolver::{self, ModelSpec, DETECTION_MODEL, EMBEDDING_MODEL};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Censor faces in a video: all of them, only specific people, or everyone
/// except specific people.
#[derive(Parser)]
#[command(name = "blurfaces")]
struct Cli {
    /// Input video file.
    input: PathBuf,

    /// Output video file.
    output: PathBuf,

    /// Which faces to censor: all, one, allexcept.
    #[arg(long, default_value = "all")]
    mode: String,

    /// Reference face image (repeatable). Required for one and allexcept.
    #[arg(long = "reference", short = 'r')]
    references: Vec<PathBuf>,

    /// Detection model: hog (faster) or cnn (more accurate).
    #[arg(long, default_value = "hog")]
    model: String,

    /// Censor type: gaussianblur, pixelation, facemasking.
    #[arg(long, default_value = "gaussianblur")]
    censor: String,

    /// Upsampling passes for small faces (1-10).
    #[arg(long, default_value = "1")]
    upsample: u32,

    /// Run as a background job and print JSON status snapshots.
    #[arg(long)]
    background: bool,

    /// Directory holding pre-downloaded model files.
    #[arg(long)]
    model_dir: Option<PathBuf>,
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
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    let request = JobRequest::parse(
        cli.input.clone(),
        &cli.mode,
        &cli.model,
        &cli.censor,
        cli.upsample,
        cli.references.clone(),
    )?;

    let capability = build_capability(cli.model_dir.as_deref())?;
    let processor = Arc::new(FfmpegVideoProcessor::new(capability));

    if cli.background {
        run_background(processor, request, &cli.output)
    } else {
        run_sync(processor.as_ref(), &request, &cli.output)
    }
}

fn run_sync(
    processor: &dyn VideoProcessor,
    request: &JobRequest,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = processor.process(
        request,
        output,
        Box::new(|current, total| {
            if total > 0 {
                eprint!("\rProcessing frame {current}/{total}");
            } else {
                eprint!("\rProcessing frame {current}");
            }
        }),
    )?;
    eprintln!();
    log::info!(
        "Output written to {} ({} frames, {:.1} fps)",
        output.display(),
        summary.frames,
        summary.frames_per_second()
    );
    Ok(())
}

/// Submits through the job manager, printing a snapshot whenever the job's
/// status or progress changes, then moves the artifact to `output`.
fn run_background(
    processor: Arc<FfmpegVideoProcessor>,
    request: JobRequest,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let manager = JobManager::new(
        processor,
        JobManagerConfig {
            output_dir,
            delete_inputs: false,
        },
    )?;
    let id = manager.submit(request)?;

    let mut last = None;
    let snapshot = loop {
        let snapshot = manager.status(id)?;
        let key = (snapshot.status, snapshot.progress);
        if last != Some(key) {
            println!("{}", snapshot.to_json()?);
            last = Some(key);
        }
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    if snapshot.status == JobStatus::Failed {
        let reason = snapshot.error.unwrap_or_else(|| "unknown error".to_string());
        manager.cleanup(id)?;
        return Err(reason.into());
    }

    let artifact = manager.result(id)?;
    std::fs::rename(&artifact, output)?;
    manager.cleanup(id)?;
    log::info!("Output written to {}", output.display());
    Ok(())
}

fn build_capability(
    model_dir: Option<&Path>,
) -> Result<Arc<dyn FaceCapability>, Box<dyn std::error::Error>> {
    let detector = resolve_model(DETECTION_MODEL, model_dir)?;
    let embedder = resolve_model(EMBEDDING_MODEL, model_dir)?;
    Ok(Arc::new(OnnxFaceCapability::new(&detector, &embedder)?))
}

fn resolve_model(
    model: ModelSpec,
    model_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {}", model.file_name);
    let name = model.file_name;
    let path = model_resolver::resolve(
        model,
        model_dir,
        Some(Box::new(move |downloaded, total| {
            download_progress(name, downloaded, total)
        })),
    )?;
    eprintln!();
    Ok(path)
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}
