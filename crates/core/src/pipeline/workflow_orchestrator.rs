use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;

use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::matching::face_matcher::FaceMatcher;
use crate::matching::match_record::MatchRecord;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::reference_image::{load_reference, ReferenceImageError};
use crate::pipeline::workflow_result::WorkflowResult;
use crate::sampling::frame_sampler::{FrameSampler, SamplerError, SamplerOptions};
use crate::sampling::sample_config::SamplingMode;
use crate::shared::settings::Settings;
use crate::source::source_resolver::{SourceError, VideoSourceResolver};
use crate::video::domain::video_reader::VideoReader;

/// Builds a fresh, unopened video reader.
pub type ReaderFactory = Box<dyn Fn() -> Box<dyn VideoReader> + Send>;

/// Where a run currently is, or how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    Idle,
    ValidatingImage,
    ValidatingSource,
    Resolving,
    Sampling,
    Matching,
    Completed,
    Failed,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStage::Idle => "idle",
            WorkflowStage::ValidatingImage => "validating image",
            WorkflowStage::ValidatingSource => "validating video source",
            WorkflowStage::Resolving => "resolving video",
            WorkflowStage::Sampling => "sampling frames",
            WorkflowStage::Matching => "matching faces",
            WorkflowStage::Completed => "completed",
            WorkflowStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRequest {
    pub image_path: PathBuf,
    /// Local path or http(s) URL.
    pub video_source: String,
    /// Overrides the configured sampling mode.
    pub mode: Option<SamplingMode>,
}

#[derive(Error, Debug)]
enum WorkflowError {
    #[error(transparent)]
    Reference(#[from] ReferenceImageError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sampling(#[from] SamplerError),
}

/// Runs one search from reference photo to timestamped matches.
///
/// Every temporary file a run creates is removed before [`run`] returns,
/// whether the run succeeds, fails or panics.
///
/// [`run`]: WorkflowOrchestrator::run
pub struct WorkflowOrchestrator {
    embedder: Box<dyn FaceEmbedder>,
    resolver: VideoSourceResolver,
    reader_factory: ReaderFactory,
    settings: Settings,
    logger: Box<dyn PipelineLogger>,
    stage: WorkflowStage,
    failed_at: Option<WorkflowStage>,
}

impl WorkflowOrchestrator {
    pub fn new(
        embedder: Box<dyn FaceEmbedder>,
        resolver: VideoSourceResolver,
        reader_factory: ReaderFactory,
        settings: Settings,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            embedder,
            resolver,
            reader_factory,
            settings,
            logger,
            stage: WorkflowStage::Idle,
            failed_at: None,
        }
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    /// The stage the last run was in when it failed.
    pub fn failed_at(&self) -> Option<WorkflowStage> {
        self.failed_at
    }

    pub fn run(&mut self, request: &WorkflowRequest) -> WorkflowResult {
        let start = Instant::now();
        self.stage = WorkflowStage::Idle;
        self.failed_at = None;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_run(request)));
        let result = match outcome {
            Ok(Ok(matches)) => {
                self.enter(WorkflowStage::Completed);
                WorkflowResult::completed(matches)
            }
            Ok(Err(e)) => {
                log::warn!("Search failed while {}: {e}", self.stage);
                self.fail();
                WorkflowResult::failed(e.to_string())
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                log::error!("Search aborted while {}: {reason}", self.stage);
                self.fail();
                WorkflowResult::failed(format!("An unexpected error occurred: {reason}"))
            }
        };

        log::info!(
            "{} ({:.1}s)",
            result.message,
            start.elapsed().as_secs_f64()
        );
        self.logger.summary();
        result
    }

    fn try_run(&mut self, request: &WorkflowRequest) -> Result<Vec<MatchRecord>, WorkflowError> {
        self.enter(WorkflowStage::ValidatingImage);
        let reference = load_reference(
            &request.image_path,
            self.embedder.as_mut(),
            self.settings.min_face_confidence,
        )?;
        self.logger.info(&reference.message);

        self.enter(WorkflowStage::ValidatingSource);
        let kind = {
            let mut probe = (self.reader_factory)();
            self.resolver.validate(&request.video_source, probe.as_mut())?
        };

        self.enter(WorkflowStage::Resolving);
        let source = self.resolver.resolve(&request.video_source, kind)?;
        log::debug!("Resolved {:?} source to {}", source.kind(), source.path().display());

        self.enter(WorkflowStage::Sampling);
        let mode = request.mode.unwrap_or(self.settings.mode);
        let sampler = FrameSampler::new(
            (self.reader_factory)(),
            SamplerOptions::from(&self.settings),
        );
        let video = sampler.open(source.path(), mode)?;
        self.logger.info(&format!(
            "Sampling every {} frames ({mode}), about {} frames to check",
            video.config.frame_interval, video.config.processable_frames
        ));

        self.enter(WorkflowStage::Matching);
        let mut matcher = FaceMatcher::new(
            self.embedder.as_mut(),
            &reference.embedding,
            self.settings.distance_threshold,
            self.settings.min_face_confidence,
        );
        let outcome = matcher.find_matches(
            video.frames,
            video.config.fps,
            video.config.processable_frames,
            self.logger.as_mut(),
        )?;
        Ok(outcome.matches)
    }

    fn enter(&mut self, stage: WorkflowStage) {
        log::debug!("Workflow stage: {stage}");
        self.stage = stage;
    }

    fn fail(&mut self) {
        self.failed_at = Some(self.stage);
        self.stage = WorkflowStage::Failed;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
