//! Pre-flight checks on an input set before a run is started.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::codec::{CodecError, ImageCodec};
use crate::frame::ImageDimensions;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("At least 2 images are required for stacking, got {count}")]
    TooFewInputs { count: usize },

    #[error("Cannot read '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("'{path}' is {found}, expected {expected}")]
    DimensionMismatch {
        path: PathBuf,
        expected: ImageDimensions,
        found: ImageDimensions,
    },
}

/// Check that at least two inputs exist, all are readable, and all share the
/// first input's dimensions.
pub fn validate_inputs<C, P>(codec: &C, paths: &[P]) -> Result<ImageDimensions, ValidationError>
where
    C: ImageCodec + ?Sized,
    P: AsRef<Path>,
{
    if paths.len() < 2 {
        return Err(ValidationError::TooFewInputs { count: paths.len() });
    }

    let mut expected: Option<ImageDimensions> = None;
    for path in paths {
        let path = path.as_ref();
        let found = codec
            .dimensions(path)
            .map_err(|source| ValidationError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
        match expected {
            None => expected = Some(found),
            Some(expected) if expected != found => {
                return Err(ValidationError::DimensionMismatch {
                    path: path.to_path_buf(),
                    expected,
                    found,
                });
            }
            Some(_) => {}
        }
    }

    let dimensions = expected.unwrap_or_default();
    tracing::debug!(count = paths.len(), %dimensions, "Validated stacking inputs");
    Ok(dimensions)
}
