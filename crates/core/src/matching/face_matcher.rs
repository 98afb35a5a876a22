use std::time::Instant;

use crate::detection::domain::face_embedder::{EmbedError, FaceDescriptor, FaceEmbedder};
use crate::matching::match_record::MatchRecord;
use crate::matching::reference_embedding::ReferenceEmbedding;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::sampling::frame_sampler::{FrameBatch, SamplerError};
use crate::shared::frame::Frame;

/// Per-run counters reported alongside the matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub frames_examined: usize,
    pub skipped_no_face: usize,
    pub skipped_errors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Matches in consumption order, so frame indices strictly increase.
    pub matches: Vec<MatchRecord>,
    pub stats: MatchStats,
}

/// What happened to a single sampled frame.
enum FrameVerdict {
    Match,
    NoMatch,
    NoFace,
    Failed,
}

/// Compares every sampled frame against the reference face.
pub struct FaceMatcher<'a> {
    embedder: &'a mut dyn FaceEmbedder,
    reference: &'a ReferenceEmbedding,
    distance_threshold: f64,
    min_face_confidence: f64,
}

impl<'a> FaceMatcher<'a> {
    pub fn new(
        embedder: &'a mut dyn FaceEmbedder,
        reference: &'a ReferenceEmbedding,
        distance_threshold: f64,
        min_face_confidence: f64,
    ) -> Self {
        Self {
            embedder,
            reference,
            distance_threshold,
            min_face_confidence,
        }
    }

    /// Drains `batches`, returning every matching frame.
    ///
    /// Per-frame embedding failures are skipped and counted. A sampler
    /// error aborts the run; frames already matched are discarded with it.
    /// `expected_frames` only feeds progress reporting.
    pub fn find_matches<I>(
        &mut self,
        batches: I,
        fps: f64,
        expected_frames: usize,
        logger: &mut dyn PipelineLogger,
    ) -> Result<MatchOutcome, SamplerError>
    where
        I: IntoIterator<Item = Result<FrameBatch, SamplerError>>,
    {
        let mut matches = Vec::new();
        let mut stats = MatchStats::default();

        for batch in batches {
            for frame in batch? {
                let start = Instant::now();
                let verdict = self.examine(&frame, logger);
                logger.timing("embed", start.elapsed().as_secs_f64() * 1000.0);

                stats.frames_examined += 1;
                match verdict {
                    FrameVerdict::Match => {
                        let record = MatchRecord::new(frame.index(), fps);
                        log::debug!(
                            "Match at frame {} ({})",
                            record.frame_index,
                            record.timestamp
                        );
                        matches.push(record);
                    }
                    FrameVerdict::NoMatch => {}
                    FrameVerdict::NoFace => stats.skipped_no_face += 1,
                    FrameVerdict::Failed => stats.skipped_errors += 1,
                }
                logger.progress(stats.frames_examined, expected_frames);
            }
        }

        log::info!(
            "Examined {} sampled frames: {} matches, {} without a face, {} failed",
            stats.frames_examined,
            matches.len(),
            stats.skipped_no_face,
            stats.skipped_errors
        );
        Ok(MatchOutcome { matches, stats })
    }

    fn examine(&mut self, frame: &Frame, logger: &mut dyn PipelineLogger) -> FrameVerdict {
        let descriptors = match self.embedder.represent(frame) {
            Ok(descriptors) => descriptors,
            Err(EmbedError::NoFace) => {
                log::debug!("No face in frame {}", frame.index());
                return FrameVerdict::NoFace;
            }
            Err(e) => {
                log::warn!("Skipping frame {}: {e}", frame.index());
                return FrameVerdict::Failed;
            }
        };
        logger.metric("faces_per_frame", descriptors.len() as f64);

        let mut confident = descriptors
            .iter()
            .filter(|d| d.confidence >= self.min_face_confidence)
            .peekable();
        if confident.peek().is_none() {
            log::debug!(
                "No face above confidence {} in frame {}",
                self.min_face_confidence,
                frame.index()
            );
            return FrameVerdict::NoFace;
        }

        if confident.any(|d| self.is_match(d)) {
            FrameVerdict::Match
        } else {
            FrameVerdict::NoMatch
        }
    }

    fn is_match(&self, descriptor: &FaceDescriptor) -> bool {
        self.reference
            .distance_to(&descriptor.embedding)
            .is_some_and(|distance| distance < self.distance_threshold)
    }
}
