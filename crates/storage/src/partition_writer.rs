use chrono::NaiveDate;
use common::models::Signal;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::StorageError;
use crate::repositories::SignalRepository;

const QUEUE_DEPTH: usize = 256;

struct AppendRequest {
    signal: Signal,
    ack: oneshot::Sender<Result<i64, StorageError>>,
}

/// The only task allowed to write one date's partition. Appends are queued
/// and applied one at a time, so queue order is append order.
pub struct PartitionWriter {
    date: NaiveDate,
    tx: mpsc::Sender<AppendRequest>,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct PartitionHandle {
    date: NaiveDate,
    tx: mpsc::Sender<AppendRequest>,
}

impl PartitionWriter {
    pub fn spawn(date: NaiveDate, pool: SqlitePool) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let handle = tokio::spawn(Self::run(date, pool, rx));
        Self { date, tx, handle }
    }

    pub fn handle(&self) -> PartitionHandle {
        PartitionHandle {
            date: self.date,
            tx: self.tx.clone(),
        }
    }

    /// Stops accepting work, drains what is queued, then closes the pool.
    pub async fn shutdown(self) {
        let Self { date, tx, handle } = self;
        drop(tx);
        if let Err(e) = handle.await {
            error!("Partition {} writer ended abnormally: {}", date, e);
        }
    }

    async fn run(date: NaiveDate, pool: SqlitePool, mut rx: mpsc::Receiver<AppendRequest>) {
        info!("Partition {} writer started", date);

        while let Some(AppendRequest { signal, ack }) = rx.recv().await {
            let result = SignalRepository::append(&pool, &signal).await;
            match &result {
                Ok(seq) => debug!("Appended signal {:?} to {} as #{}", signal.id, date, seq),
                Err(e) => error!("Append to partition {} failed: {}", date, e),
            }
            let _ = ack.send(result);
        }

        pool.close().await;
        info!("Partition {} writer closed", date);
    }
}

impl PartitionHandle {
    pub async fn append(&self, signal: Signal) -> Result<i64, StorageError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(AppendRequest { signal, ack })
            .await
            .map_err(|_| StorageError::WriterGone(self.date))?;
        done.await.map_err(|_| StorageError::WriterGone(self.date))?
    }
}
