//! Error type definitions.
//!
//! Every failure dds2png can report, grouped by the stage that produces it:
//! pattern parsing, directory enumeration, decoding, encoding, and the
//! per-job conversion boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::codec::PixelFormat;

/// Rejected input pattern. Aborts resolution of that pattern only.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Empty pattern string
    #[error("empty input pattern")]
    Empty,

    /// No segment names the files to convert
    #[error("pattern does not name any files: {pattern}")]
    MissingFilePattern { pattern: String },

    /// More than one `**` segment
    #[error("pattern contains more than one `**` segment: {pattern}")]
    MultipleRecursive { pattern: String },

    /// Wildcard directory segment in front of `**`
    #[error("segment `{segment}` before `**` must be a literal directory name: {pattern}")]
    NonLiteralBase { pattern: String, segment: String },

    /// `**` must be followed by exactly one filename pattern
    #[error("`**` must be followed by exactly one filename pattern: {pattern}")]
    TrailingSegments { pattern: String },

    /// Segment the glob syntax rejects
    #[error("invalid glob segment `{segment}`: {reason}")]
    InvalidGlob { segment: String, reason: String },
}

/// Non-fatal failure while walking the filesystem. The affected subtree is
/// skipped and enumeration continues with its siblings.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Directory listing failed
    #[error("cannot read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Recursive walk reported an error below the base directory
    #[error("cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Decode collaborator failure.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported image format: {reason}")]
    UnsupportedFormat { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt image data: {reason}")]
    CorruptData { reason: String },
}

/// Encode collaborator failure.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("unsupported pixel format: {0:?}")]
    UnsupportedPixelFormat(PixelFormat),

    #[error("pixel buffer does not match image layout: {reason}")]
    InvalidBuffer { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoder failed: {reason}")]
    Encoder { reason: String },
}

/// Per-job failure. Always recorded into the run outcome, never propagated
/// past the scheduler.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Creating the output directory or removing a stale output failed
    #[error("cannot write output {path}: {reason}")]
    OutputWrite { path: PathBuf, reason: String },

    /// Overwriting would destroy the input itself
    #[error("input and output are the same file: {path}")]
    SameFile { path: PathBuf },

    #[error("decode failed ({file}): {source}")]
    Decode {
        file: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("encode failed ({file}): {source}")]
    Encode {
        file: PathBuf,
        #[source]
        source: EncodeError,
    },

    /// The job panicked; caught at the job boundary
    #[error("conversion panicked ({file}): {reason}")]
    Panicked { file: PathBuf, reason: String },
}

/// Crate-level errors that abort a whole run.
#[derive(Error, Debug)]
pub enum Dds2PngError {
    /// Rejected configuration value
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Worker pool could not be created
    #[error("failed to build worker pool: {reason}")]
    ThreadPoolError { reason: String },

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// dds2png result alias
pub type Result<T> = std::result::Result<T, Dds2PngError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_error_mentions_path() {
        let error = ConvertError::Decode {
            file: PathBuf::from("textures/rock.dds"),
            source: DecodeError::CorruptData {
                reason: "truncated block".to_string(),
            },
        };
        let msg = error.to_string();
        assert!(msg.contains("textures/rock.dds"));
        assert!(msg.contains("decode failed"));
    }

    #[test]
    fn test_pattern_error_converts_into_crate_error() {
        let error: Dds2PngError = PatternError::Empty.into();
        assert_eq!(error.to_string(), "empty input pattern");
    }

    #[test]
    fn test_unsupported_pixel_format_display() {
        let error = EncodeError::UnsupportedPixelFormat(PixelFormat::Rgba16);
        assert!(error.to_string().contains("Rgba16"));
    }
}
