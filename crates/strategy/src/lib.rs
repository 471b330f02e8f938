pub mod detection;
pub mod errors;
pub mod remote;
pub mod signals;

pub use detection::{DetectorConfig, DetectorKind, PatternDetector, build_detector};
pub use errors::DetectionBackendError;
pub use signals::{SignalConfig, SignalGenerator, SignalMode, build_generator};
