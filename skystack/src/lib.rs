//! Skystack - star-aligned stacking of night-sky photographs.
//!
//! Frames of the same star field are decoded, registered onto the first
//! loaded frame by matching detected stars, and combined into one low-noise
//! composite:
//! - Star detection (luminance, Gaussian smoothing, threshold, blob centroids)
//! - Registration (greedy nearest-neighbour matching, RANSAC affine fit, bilinear warp)
//! - Stacking (average, median, maximum, sigma-clipped mean)
//! - A light contrast/sharpness finish
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use skystack::{CancellationToken, LogProgress, Parameters, StackPipeline};
//!
//! let mut pipeline = StackPipeline::new(Parameters::default());
//! let result = pipeline.run(&paths, &LogProgress, &CancellationToken::new())?;
//! result.save(pipeline.codec(), "stacked.jpg", 95)?;
//! ```

pub mod codec;
mod enhance;
mod frame;
pub mod pipeline;
pub mod registration;
pub mod stacking;
pub mod star_detection;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Frames and codecs
// ============================================================================

pub use codec::{CodecError, DEFAULT_QUALITY, FileCodec, ImageCodec};
pub use frame::{Frame, FrameStore, ImageDimensions, Rgb8, RgbBuffer, luma, luminance};

// ============================================================================
// Star detection
// ============================================================================

pub use star_detection::{Config as StarDetectionConfig, StarDetector, StarPoint};

// ============================================================================
// Registration
// ============================================================================

pub use registration::{
    Alignment, AlignmentFailure, Config as RegistrationConfig, FrameAligner, Transform,
    TransformModel,
};

// ============================================================================
// Stacking
// ============================================================================

pub use stacking::{AlignedStack, CombineMethod, Config as StackingConfig, StackingError, combine};

// ============================================================================
// Enhancement
// ============================================================================

pub use enhance::{CONTRAST_FACTOR, SHARPNESS_FACTOR, adjust_contrast, adjust_sharpness, enhance};

// ============================================================================
// Pipeline
// ============================================================================

pub use pipeline::{
    CancellationToken, ChannelProgress, InvalidParameter, LogProgress, NoProgress, Parameters,
    PipelineError, PipelineHandle, PipelineState, ProgressEvent, ProgressSink, StackPipeline,
    StackResult, StackSummary, ValidationError, default_output_path, estimate_processing_time,
    validate_inputs,
};
