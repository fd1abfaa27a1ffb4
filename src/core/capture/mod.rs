pub mod camera;
pub mod error;
pub mod session;
pub mod store;

pub use camera::{Camera, ReplayCamera};
pub use error::CaptureError;
pub use session::{CaptureConfig, CaptureSession, DirectoryClaim, DirectoryClaims};
pub use store::{FrameStore, RetentionPolicy};
