use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::sampling::sample_config::{effective_fps, SampleConfig, SamplingMode};
use crate::shared::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_SINGLE_PASS_MAX_FRAMES, LARGE_VIDEO_BYTES, LARGE_VIDEO_MINUTES,
};
use crate::shared::frame::Frame;
use crate::shared::settings::Settings;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::{VideoError, VideoReader};

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("could not open video: {0}")]
    Open(#[source] VideoError),
    #[error("frame extraction failed: {0}")]
    Decode(#[source] VideoError),
    #[error("No frames extracted")]
    NoFramesExtracted,
}

/// One pull from the sampled-frame stream.
pub type FrameBatch = Vec<Frame>;

/// How the sampled frames are grouped into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStrategy {
    /// Small video: the whole sample is expected to fit one terminal batch.
    SinglePass { max_frames: usize },
    /// Large video: fixed-size batches.
    Batched { batch_size: usize },
}

impl StreamStrategy {
    pub fn batch_capacity(self) -> usize {
        match self {
            StreamStrategy::SinglePass { max_frames } => max_frames.max(1),
            StreamStrategy::Batched { batch_size } => batch_size.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerOptions {
    pub batch_size: usize,
    pub single_pass_max_frames: usize,
    pub large_video_bytes: u64,
    pub large_video_minutes: f64,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            single_pass_max_frames: DEFAULT_SINGLE_PASS_MAX_FRAMES,
            large_video_bytes: LARGE_VIDEO_BYTES,
            large_video_minutes: LARGE_VIDEO_MINUTES,
        }
    }
}

impl From<&Settings> for SamplerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            batch_size: settings.batch_size,
            single_pass_max_frames: settings.single_pass_max_frames,
            large_video_bytes: settings.large_video_bytes,
            large_video_minutes: settings.large_video_minutes,
        }
    }
}

impl SamplerOptions {
    /// A video is large if its file exceeds the byte threshold or its
    /// estimated duration exceeds the minute threshold. An unknown duration
    /// leaves the decision to the file size.
    pub fn is_large(&self, file_size: u64, duration_minutes: Option<f64>) -> bool {
        file_size > self.large_video_bytes
            || duration_minutes.is_some_and(|minutes| minutes > self.large_video_minutes)
    }

    pub fn strategy_for(&self, file_size: u64, duration_minutes: Option<f64>) -> StreamStrategy {
        if self.is_large(file_size, duration_minutes) {
            StreamStrategy::Batched {
                batch_size: self.batch_size,
            }
        } else {
            StreamStrategy::SinglePass {
                max_frames: self.single_pass_max_frames,
            }
        }
    }
}

/// An opened video ready to be consumed.
pub struct SampledVideo {
    pub metadata: VideoMetadata,
    pub config: SampleConfig,
    pub strategy: StreamStrategy,
    pub frames: SampledFrames,
}

/// Opens a video and turns it into a lazy stream of sampled frame batches.
///
/// Consumed by [`FrameSampler::open`]: a sampled stream can't be restarted,
/// sampling again means building a new sampler and re-opening the file.
pub struct FrameSampler {
    reader: Box<dyn VideoReader>,
    options: SamplerOptions,
}

impl FrameSampler {
    pub fn new(reader: Box<dyn VideoReader>, options: SamplerOptions) -> Self {
        Self { reader, options }
    }

    pub fn open(self, path: &Path, mode: SamplingMode) -> Result<SampledVideo, SamplerError> {
        let mut reader = ReaderHandle(self.reader);
        let mut metadata = reader.0.open(path).map_err(SamplerError::Open)?;
        metadata.fps = effective_fps(metadata.fps);

        if metadata.total_frames == 0 {
            log::warn!(
                "Frame count unavailable for {}, counting frames manually",
                path.display()
            );
            metadata.total_frames = count_frames(reader.0.as_mut())?;
            reader.0.close();
            reader.0.open(path).map_err(SamplerError::Open)?;
        }

        let config = SampleConfig::new(mode, metadata.fps, metadata.total_frames);
        let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let strategy = self
            .options
            .strategy_for(file_size, metadata.duration_minutes());

        log::info!(
            "Sampling {} ({} frames at {:.2} fps): every {} frames, ~{} samples, {:?}",
            path.display(),
            config.total_frames,
            config.fps,
            config.frame_interval,
            config.processable_frames,
            strategy
        );

        let frames = SampledFrames::new(reader, config, strategy.batch_capacity());
        Ok(SampledVideo {
            metadata,
            config,
            strategy,
            frames,
        })
    }
}

/// Decodes the whole stream just to count frames. Terminates at end-of-stream.
fn count_frames(reader: &mut dyn VideoReader) -> Result<usize, SamplerError> {
    let mut count = 0;
    while reader.skip_frame().map_err(SamplerError::Decode)? {
        count += 1;
    }
    Ok(count)
}

/// Owns a reader and closes it when dropped.
struct ReaderHandle(Box<dyn VideoReader>);

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Lazy, finite, single-use stream of sampled frame batches.
///
/// Only frames whose index is a multiple of the interval are converted
/// and emitted; indices are strictly increasing across batches. The
/// reader is closed at end-of-stream, after an error, or when the stream
/// is dropped early. A video with no sampled frame yields a single
/// [`SamplerError::NoFramesExtracted`].
pub struct SampledFrames {
    reader: Option<ReaderHandle>,
    config: SampleConfig,
    batch_capacity: usize,
    next_index: usize,
    emitted: usize,
}

impl SampledFrames {
    fn new(reader: ReaderHandle, config: SampleConfig, batch_capacity: usize) -> Self {
        Self {
            reader: Some(reader),
            config,
            batch_capacity: batch_capacity.max(1),
            next_index: 0,
            emitted: 0,
        }
    }

    /// Advances to the next sampled frame, skipping the ones in between.
    fn next_sample(&mut self) -> Result<Option<Frame>, SamplerError> {
        let Some(handle) = self.reader.as_mut() else {
            return Ok(None);
        };
        let reader = handle.0.as_mut();

        while !self.config.is_sampled(self.next_index) {
            if !reader.skip_frame().map_err(SamplerError::Decode)? {
                return Ok(None);
            }
            self.next_index += 1;
        }

        match reader.read_frame().map_err(SamplerError::Decode)? {
            Some(frame) => {
                debug_assert_eq!(frame.index(), self.next_index);
                self.next_index += 1;
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.reader = None;
    }
}

impl Iterator for SampledFrames {
    type Item = Result<FrameBatch, SamplerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.as_ref()?;

        let mut batch = Vec::new();
        while batch.len() < self.batch_capacity {
            match self.next_sample() {
                Ok(Some(frame)) => {
                    self.emitted += 1;
                    batch.push(frame);
                }
                Ok(None) => {
                    self.release();
                    if !batch.is_empty() {
                        break;
                    }
                    if self.emitted == 0 {
                        return Some(Err(SamplerError::NoFramesExtracted));
                    }
                    return None;
                }
                Err(e) => {
                    self.release();
                    return Some(Err(e));
                }
            }
        }

        log::debug!(
            "Sampled batch of {} frames ({} so far)",
            batch.len(),
            self.emitted
        );
        Some(Ok(batch))
    }
}
