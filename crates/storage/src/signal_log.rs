use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use common::models::Signal;
use futures_util::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::db::{open_reader_pool, open_writer_pool, parse_partition_file_name, partition_path};
use crate::errors::StorageError;
use crate::partition_writer::{PartitionHandle, PartitionWriter};
use crate::repositories::SignalRepository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    pub id: String,
    pub date: NaiveDate,
    pub seq: i64,
}

/// Date-partitioned append-only store of dispatched signals.
///
/// Each partition has exactly one writer task, started lazily on the first
/// append for its date. Reads open their own short-lived connection and
/// never go through the writer.
pub struct SignalLog {
    dir: PathBuf,
    writers: RwLock<HashMap<NaiveDate, PartitionWriter>>,
    closed: AtomicBool,
}

impl SignalLog {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        info!("Signal log at {}", dir.display());
        Ok(Self {
            dir,
            writers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Appends a signal that already carries its id to the partition of its
    /// dispatch time's UTC date.
    pub async fn append(&self, signal: &Signal) -> Result<AppendReceipt, StorageError> {
        let id = signal.id.clone().ok_or(StorageError::MissingId)?;
        let date = signal.partition_date().ok_or(StorageError::NotDispatched)?;
        let writer = self.writer_for(date).await?;
        let seq = writer.append(signal.clone()).await?;
        Ok(AppendReceipt { id, date, seq })
    }

    async fn writer_for(&self, date: NaiveDate) -> Result<PartitionHandle, StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }

        let read = self.writers.read().await;
        if let Some(writer) = read.get(&date) {
            return Ok(writer.handle());
        }
        drop(read);

        let mut write = self.writers.write().await;
        // close() flips the flag before taking the write lock
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        if let Some(writer) = write.get(&date) {
            return Ok(writer.handle());
        }

        let pool = open_writer_pool(&self.dir, date).await?;
        let writer = PartitionWriter::spawn(date, pool);
        let handle = writer.handle();
        write.insert(date, writer);
        Ok(handle)
    }

    /// Partition dates present on disk, newest first.
    pub async fn partitions(&self) -> Result<Vec<NaiveDate>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut dates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(date) = entry.file_name().to_str().and_then(parse_partition_file_name) {
                dates.push(date);
            }
        }
        dates.sort_unstable_by(|a, b| b.cmp(a));
        Ok(dates)
    }

    /// Up to `limit` most recently appended signals, newest first, walking
    /// back through as many partitions as it takes.
    pub async fn recent(&self, limit: usize) -> Result<Vec<Signal>, StorageError> {
        let mut out = Vec::with_capacity(limit.min(128));
        if limit == 0 {
            return Ok(out);
        }

        for date in self.partitions().await? {
            let pool = open_reader_pool(&self.dir, date).await?;
            let batch = SignalRepository::fetch_latest(&pool, limit - out.len()).await;
            pool.close().await;
            out.extend(batch?);

            if out.len() >= limit {
                break;
            }
        }
        debug!("Read {} recent signals", out.len());
        Ok(out)
    }

    /// Everything appended under `date`, in append order. A date without a
    /// partition is simply empty.
    pub async fn for_date(&self, date: NaiveDate) -> Result<Vec<Signal>, StorageError> {
        if !tokio::fs::try_exists(partition_path(&self.dir, date)).await? {
            return Ok(Vec::new());
        }
        let pool = open_reader_pool(&self.dir, date).await?;
        let signals = SignalRepository::fetch_all(&pool).await;
        pool.close().await;
        signals
    }

    /// Refuses further appends, lets every writer drain its queue and closes
    /// the partition files.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let writers: Vec<PartitionWriter> = {
            let mut write = self.writers.write().await;
            write.drain().map(|(_, w)| w).collect()
        };
        let count = writers.len();
        join_all(writers.into_iter().map(PartitionWriter::shutdown)).await;
        info!("Signal log closed ({} partition writers)", count);
    }
}
