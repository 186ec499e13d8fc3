//! Error types for trackvue

use thiserror::Error;

/// Main error type for trackvue operations
#[derive(Error, Debug)]
pub enum TrackvueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("track `{0}` not found")]
    TrackNotFound(String),

    #[error("track `{0}` has no markers")]
    EmptyTrack(String),

    #[error("object `{0}` not found")]
    ObjectNotFound(String),

    #[error("object used for camera solving cannot be deleted")]
    CameraObjectDelete,

    #[error("invalid region: {width}x{height}")]
    InvalidRegion { width: i64, height: i64 },

    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("frame {0} could not be loaded")]
    FrameLoad(i32),

    #[error("at least 8 common tracks on both keyframes are needed for reconstruction (found {found})")]
    NotEnoughKeyframeTracks { found: usize },

    #[error("solver failed: {0}")]
    Solver(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrackvueError>;
