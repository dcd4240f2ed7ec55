// THEORY:
// Every failure the engine can report falls into one of a handful of buckets.
// Source-level failures (`SourceUnavailable`, `DecodeFailure`) are surfaced to the
// user at the point where a file or device was opened. Transform-level failures
// (`OutOfBounds`, `TransformFailure`) never escape the pipeline: they cost exactly
// one frame and are logged. `Disconnected` covers the presentation boundary going
// away underneath a running session.

use thiserror::Error;

pub type VisionResult<T> = Result<T, VisionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisionError {
    /// No capture device or no file to read from.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The input bytes could not be interpreted as a 4-channel pixel buffer.
    #[error("could not decode image: {0}")]
    DecodeFailure(String),

    /// A pixel address fell outside the buffer. Indicates a defect in a transform.
    #[error("pixel ({x}, {y}) is outside a {width}x{height} buffer")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("transform failed: {0}")]
    TransformFailure(String),

    /// The presentation boundary is no longer accepting frames.
    #[error("display has shut down")]
    Disconnected,
}

impl From<image::ImageError> for VisionError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                VisionError::SourceUnavailable(io.to_string())
            }
            other => VisionError::DecodeFailure(other.to_string()),
        }
    }
}

impl VisionError {
    /// True for failures that only cost the current frame.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            VisionError::OutOfBounds { .. } | VisionError::TransformFailure(_)
        )
    }
}
