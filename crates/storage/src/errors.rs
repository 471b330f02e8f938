use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Signal has no id; ids are assigned before append")]
    MissingId,
    #[error("Signal has no dispatch time; it is stamped before append")]
    NotDispatched,
    #[error("Writer for partition {0} stopped before acknowledging the append")]
    WriterGone(NaiveDate),
    #[error("Signal log is closed")]
    Closed,
}
