pub mod candle;
pub mod pattern;
pub mod signal;
pub mod timestamp;

pub use candle::{Candle, CandleSource};
pub use pattern::{DetectionMethod, Direction, Pattern};
pub use signal::{Signal, SignalSource, SignalType};
