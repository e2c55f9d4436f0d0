//! Error types for stacking runs.

use std::path::PathBuf;

use thiserror::Error;

use super::config::InvalidParameter;
use super::result::StackResult;
use super::PipelineState;
use crate::codec::CodecError;

/// Why a run produced no result (or, for [`PipelineError::Write`], no file).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline already used (state: {state})")]
    AlreadyRun { state: PipelineState },

    #[error(transparent)]
    InvalidParameters(#[from] InvalidParameter),

    #[error("At least 2 readable frames are required, loaded {loaded}")]
    NotEnoughFrames { loaded: usize },

    #[error("Reference frame has {found} stars, at least {required} are required")]
    TooFewReferenceStars { found: usize, required: usize },

    #[error("Only {aligned} frames could be aligned, at least 2 are required")]
    NotEnoughAlignedFrames { aligned: usize },

    #[error("Stacking was cancelled")]
    Cancelled,

    /// The composite was computed but could not be written. The result is
    /// handed back so the write can be retried.
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: CodecError,
        result: Box<StackResult>,
    },

    #[error("Failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Worker thread panicked")]
    WorkerPanicked,
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    /// The computed result carried by a write failure.
    pub fn into_result(self) -> Option<StackResult> {
        match self {
            PipelineError::Write { result, .. } => Some(*result),
            _ => None,
        }
    }
}
