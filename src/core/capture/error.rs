use crate::core::imaging::ImagingError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Frame error: {0}")]
    Imaging(#[from] ImagingError),
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("A capture session is already running in {0:?}")]
    DirectoryBusy(PathBuf),
    #[error("Invalid capture configuration: {0}")]
    InvalidConfig(String),
}
