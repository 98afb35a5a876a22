use std::path::PathBuf;
use std::process;

use clap::Parser;

use facehunt_core::detection::infrastructure::onnx_face_embedder::OnnxFaceEmbedder;
use facehunt_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facehunt_core::pipeline::workflow_orchestrator::{WorkflowOrchestrator, WorkflowRequest};
use facehunt_core::pipeline::workflow_result::WorkflowResult;
use facehunt_core::sampling::sample_config::SamplingMode;
use facehunt_core::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use facehunt_core::shared::model_resolver;
use facehunt_core::shared::settings::Settings;
use facehunt_core::source::infrastructure::http_video_fetcher::HttpVideoFetcher;
use facehunt_core::source::source_resolver::VideoSourceResolver;
use facehunt_core::video::domain::video_reader::VideoReader;
use facehunt_core::video::infrastructure::ffmpeg_reader::FfmpegReader;

/// Find the moments a person appears in a video, given one photo of them.
#[derive(Parser)]
#[command(name = "facehunt")]
struct Cli {
    /// Reference photo with exactly one face (JPG, PNG or WebP).
    image: PathBuf,

    /// Video file path or http(s) URL.
    video: String,

    /// Sampling mode: fast (every 0.5s) or precise (every 0.25s).
    #[arg(long)]
    mode: Option<SamplingMode>,

    /// Cosine distance below which a face counts as a match (0.0-2.0).
    #[arg(long)]
    threshold: Option<f64>,

    /// Ignore faces detected below this confidence (0.0-1.0).
    #[arg(long)]
    min_confidence: Option<f64>,

    /// Frames decoded per batch for large videos.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Directory for downloaded videos.
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Settings file to use instead of the per-user one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();

    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Returns whether the search succeeded.
fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    let embedder = build_embedder()?;
    let fetcher = HttpVideoFetcher::new(settings.resolved_download_dir())?
        .with_free_space_margin(settings.free_space_margin)
        .with_progress(Box::new(video_progress));
    let resolver = VideoSourceResolver::new(Box::new(fetcher));

    let mut orchestrator = WorkflowOrchestrator::new(
        Box::new(embedder),
        resolver,
        Box::new(|| Box::new(FfmpegReader::new()) as Box<dyn VideoReader>),
        settings,
        Box::new(StdoutPipelineLogger::default()),
    );

    let request = WorkflowRequest {
        image_path: cli.image,
        video_source: cli.video,
        mode: cli.mode,
    };
    let result = orchestrator.run(&request);
    if let Some(stage) = orchestrator.failed_at() {
        log::debug!("Search stopped while {stage}");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(result.success)
}

fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if let Some(mode) = cli.mode {
        settings.mode = mode;
    }
    if let Some(threshold) = cli.threshold {
        settings.distance_threshold = threshold;
    }
    if let Some(confidence) = cli.min_confidence {
        settings.min_face_confidence = confidence;
    }
    if let Some(batch_size) = cli.batch_size {
        settings.batch_size = batch_size;
    }
    if let Some(dir) = &cli.download_dir {
        settings.download_dir = Some(dir.clone());
    }
    settings.validate()?;
    Ok(settings)
}

fn build_embedder() -> Result<OnnxFaceEmbedder, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let detector_model = model_resolver::resolve(
        YOLO_MODEL_NAME,
        YOLO_MODEL_URL,
        None,
        Some(Box::new(|done, total| {
            model_progress("face detection", done, total)
        })),
    )?;
    log::info!("Resolving model: {EMBEDDING_MODEL_NAME}");
    let encoder_model = model_resolver::resolve(
        EMBEDDING_MODEL_NAME,
        EMBEDDING_MODEL_URL,
        None,
        Some(Box::new(|done, total| {
            model_progress("face recognition", done, total)
        })),
    )?;
    OnnxFaceEmbedder::from_models(&detector_model, &encoder_model)
}

fn print_result(result: &WorkflowResult) {
    if !result.success {
        eprintln!("{}", result.message);
        return;
    }
    println!("{}", result.message);
    for record in result.matches.iter().flatten() {
        println!("{}  frame {}", record.timestamp, record.frame_index);
    }
}

fn model_progress(label: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {label} model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {label} model... {downloaded} bytes");
    }
}

fn video_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading video... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading video... {} MB", downloaded / (1024 * 1024));
    }
}
