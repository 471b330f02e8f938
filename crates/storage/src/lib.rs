pub mod db;
pub mod errors;
pub mod partition_writer;
pub mod repositories;
pub mod signal_log;

pub use errors::StorageError;
pub use signal_log::{AppendReceipt, SignalLog};
