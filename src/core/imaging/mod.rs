pub mod error;
pub mod frame;
pub mod naming;
pub mod sequence;
pub mod threshold;
pub mod verdict;

pub use error::ImagingError;
pub use frame::{Frame, PixelLayout};
pub use sequence::{FrameSequence, SequenceClassifier, SequenceParams};
pub use threshold::{ThresholdClassifier, ThresholdOutcome, ThresholdParams};
pub use verdict::{ClassificationVerdict, DiagnosticCounts, EventClass};
