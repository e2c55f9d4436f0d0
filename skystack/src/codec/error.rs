//! Error types for decoding and encoding images.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by an [`ImageCodec`](super::ImageCodec).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process image '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to decode raw file '{path}': {reason}")]
    Raw { path: PathBuf, reason: String },

    #[error("Unsupported file extension: '{extension}'")]
    UnsupportedFormat { extension: String },

    #[error("Encoding quality must be within 1..=100, got {quality}")]
    InvalidQuality { quality: u8 },

    #[error("Image '{path}' has no pixels")]
    EmptyImage { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_message_names_path() {
        let err = CodecError::Io {
            path: PathBuf::from("/data/light_01.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/light_01.png"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as StdError;

        let err = CodecError::Io {
            path: PathBuf::from("/x"),
            source: std::io::Error::other("underlying"),
        };
        assert!(err.source().is_some());

        let err = CodecError::InvalidQuality { quality: 0 };
        assert!(err.source().is_none());
        assert!(err.to_string().contains("got 0"));
    }
}
