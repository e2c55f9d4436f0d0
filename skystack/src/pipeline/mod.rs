//! End-to-end stacking run: load, detect, align, combine, enhance, write.
//!
//! A [`StackPipeline`] is single-use. It walks
//! `Idle → Loading → Detecting → Aligning → Combining → Enhancing → Done`,
//! ending in `Failed` or `Cancelled` instead when a stage cannot continue.
//! Per-frame problems (unreadable file, frame that will not align) drop the
//! frame and are reported through progress; only the conditions listed in
//! [`PipelineError`] end a run.

#[cfg(test)]
mod tests;

mod config;
mod error;
mod progress;
mod result;
mod validation;
mod worker;

use std::path::Path;

use strum_macros::Display;

use crate::codec::{FileCodec, ImageCodec};
use crate::enhance::enhance;
use crate::frame::FrameStore;
use crate::registration::{AlignmentFailure, FrameAligner, MIN_CORRESPONDENCES};
use crate::stacking::AlignedStack;
use crate::star_detection::StarDetector;

pub use config::{InvalidParameter, Parameters};
pub use error::PipelineError;
pub use progress::{
    CancellationToken, ChannelProgress, LogProgress, NoProgress, ProgressEvent, ProgressSink,
};
pub use result::{StackResult, StackSummary, default_output_path, estimate_processing_time};
pub use validation::{ValidationError, validate_inputs};
pub use worker::PipelineHandle;

use progress::ProgressTracker;

/// Lifecycle of a [`StackPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Loading,
    Detecting,
    Aligning,
    Combining,
    Enhancing,
    Done,
    Failed,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Done | PipelineState::Failed | PipelineState::Cancelled
        )
    }
}

/// Single-use orchestrator of one stacking run.
#[derive(Debug)]
pub struct StackPipeline<C: ImageCodec = FileCodec> {
    codec: C,
    params: Parameters,
    state: PipelineState,
}

impl StackPipeline<FileCodec> {
    pub fn new(params: Parameters) -> Self {
        Self::with_codec(FileCodec, params)
    }
}

impl<C: ImageCodec> StackPipeline<C> {
    pub fn with_codec(codec: C, params: Parameters) -> Self {
        Self {
            codec,
            params,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Stack `paths` into one composite. The first readable path becomes the
    /// reference frame.
    pub fn run<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<StackResult, PipelineError> {
        self.run_inner(paths, None, progress, cancel)
    }

    /// Like [`StackPipeline::run`], then encode the composite to `output`.
    ///
    /// Cancellation is honoured up to the moment the write starts. A failed
    /// write returns [`PipelineError::Write`] carrying the computed result.
    pub fn run_to_file<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        output: &Path,
        quality: u8,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<StackResult, PipelineError> {
        self.run_inner(paths, Some((output, quality)), progress, cancel)
    }

    fn run_inner<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        output: Option<(&Path, u8)>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<StackResult, PipelineError> {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::AlreadyRun { state: self.state });
        }

        let mut tracker = ProgressTracker::new(progress);
        tracker.report(format!("Starting stack of {} images", paths.len()), 0);

        let outcome = self
            .params
            .validate()
            .map_err(PipelineError::from)
            .and_then(|()| self.execute(paths, output, &mut tracker, cancel));

        match &outcome {
            Ok(result) => {
                self.transition(PipelineState::Done);
                tracker.report("Stacking complete", 100);
                tracing::info!(
                    frames = result.summary.frames_stacked,
                    dropped = result.summary.frames_dropped,
                    method = %result.summary.method,
                    "Stacking finished"
                );
            }
            Err(PipelineError::Cancelled) => {
                self.transition(PipelineState::Cancelled);
                tracing::info!("Stacking cancelled");
            }
            Err(e) => {
                self.transition(PipelineState::Failed);
                tracing::error!(error = %e, "Stacking failed");
            }
        }

        outcome
    }

    fn execute<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        output: Option<(&Path, u8)>,
        tracker: &mut ProgressTracker<'_>,
        cancel: &CancellationToken,
    ) -> Result<StackResult, PipelineError> {
        // Loading
        self.transition(PipelineState::Loading);
        let store = self.load(paths, tracker, cancel)?;
        let frames_loaded = store.len();
        if frames_loaded < 2 {
            return Err(PipelineError::NotEnoughFrames {
                loaded: frames_loaded,
            });
        }

        // Detecting
        self.transition(PipelineState::Detecting);
        let mut frames = store.into_frames().into_iter();
        let Some(reference) = frames.next() else {
            return Err(PipelineError::NotEnoughFrames { loaded: 0 });
        };
        let detector = StarDetector::from_config(self.params.detection.clone());
        let reference_stars = detector.detect(&reference);
        let required = self.params.registration.min_stars.max(MIN_CORRESPONDENCES);
        if reference_stars.len() < required {
            return Err(PipelineError::TooFewReferenceStars {
                found: reference_stars.len(),
                required,
            });
        }
        tracing::info!(
            path = %reference.path().display(),
            stars = reference_stars.len(),
            "Detected reference stars"
        );
        tracker.report(
            format!("Found {} stars in reference frame", reference_stars.len()),
            25,
        );

        // Aligning
        self.transition(PipelineState::Aligning);
        let dimensions = reference.dimensions();
        let aligner = FrameAligner::new(self.params.registration.clone());
        let reference_path = reference.path().to_path_buf();
        let mut stack = AlignedStack::new(reference.into_pixels(), reference_path);

        let target_count = frames_loaded - 1;
        for (i, frame) in frames.enumerate() {
            let name = display_name(frame.path());
            let stars = detector.detect(&frame);
            let percent = ProgressTracker::fraction(30, 40, i + 1, target_count);
            let aligned = aligner
                .align(&reference_stars, &stars, frame.width(), frame.height())
                .and_then(|alignment| {
                    let matches = alignment.matches;
                    aligner
                        .warp(&frame, &alignment.transform, dimensions)
                        .map(|pixels| (alignment, pixels))
                        .ok_or(AlignmentFailure::RansacFailed { matches })
                });
            match aligned {
                Ok((alignment, pixels)) => {
                    tracing::info!(
                        frame = %name,
                        stars = stars.len(),
                        inliers = alignment.inliers,
                        rms = alignment.rms_error,
                        "Aligned frame with {}",
                        alignment.transform
                    );
                    stack.push(pixels, frame.path());
                    tracker.report(format!("Aligned {name}"), percent);
                }
                Err(failure) => {
                    tracing::warn!(
                        frame = %name,
                        stars = stars.len(),
                        reason = %failure,
                        "Dropping frame that could not be aligned"
                    );
                    tracker.report(format!("Skipped {name}: {failure}"), percent);
                }
            }
            checkpoint(cancel)?;
        }

        if stack.len() < 2 {
            return Err(PipelineError::NotEnoughAlignedFrames {
                aligned: stack.len(),
            });
        }
        checkpoint(cancel)?;

        // Combining
        self.transition(PipelineState::Combining);
        let method = self.params.stacking.method;
        tracker.report(format!("Combining {} frames ({method})", stack.len()), 75);
        let combined = stack.combine(&self.params.stacking);
        tracker.report("Frames combined", 95);

        // Enhancing
        self.transition(PipelineState::Enhancing);
        let pixels = enhance(&combined);
        tracker.report("Enhanced composite", 97);

        let result = StackResult {
            pixels,
            summary: StackSummary {
                frames_requested: paths.len(),
                frames_loaded,
                frames_stacked: stack.len(),
                frames_dropped: frames_loaded - stack.len(),
                reference_stars: reference_stars.len(),
                method,
                dimensions,
            },
        };

        if let Some((path, quality)) = output {
            checkpoint(cancel)?;
            tracker.report(format!("Writing {}", path.display()), 98);
            if let Err(source) = result.save(&self.codec, path, quality) {
                return Err(PipelineError::Write {
                    path: path.to_path_buf(),
                    source,
                    result: Box::new(result),
                });
            }
        }

        Ok(result)
    }

    fn load<P: AsRef<Path>>(
        &self,
        paths: &[P],
        tracker: &mut ProgressTracker<'_>,
        cancel: &CancellationToken,
    ) -> Result<FrameStore, PipelineError> {
        let mut store = FrameStore::new();
        for (i, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let name = display_name(path);
            let percent = ProgressTracker::fraction(0, 20, i + 1, paths.len());
            match self.codec.decode(path) {
                Ok(frame) => {
                    store.push(frame);
                    tracker.report(format!("Loaded {name}"), percent);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable frame");
                    tracker.report(format!("Skipped {name}: {e}"), percent);
                }
            }
            checkpoint(cancel)?;
        }
        tracing::info!(
            requested = paths.len(),
            loaded = store.len(),
            "Loaded frames"
        );
        Ok(store)
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = %self.state, to = %next, "Pipeline state");
        self.state = next;
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
