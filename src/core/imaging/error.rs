use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Frame buffer has {actual} bytes, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Frame {sequence} is {actual:?}, sequence frames are {expected:?}")]
    SizeMismatch {
        sequence: u64,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Frame {next} arrived after frame {previous}; sequences must be strictly increasing")]
    OutOfOrder { previous: u64, next: u64 },
    #[error("Need at least 2 frames, got {0}")]
    InsufficientFrames(usize),
}
