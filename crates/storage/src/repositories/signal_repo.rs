use common::models::Signal;
use sqlx::SqlitePool;

use crate::errors::StorageError;

pub struct SignalRepository;

impl SignalRepository {
    /// Appends one record and returns its sequence number within the partition.
    pub async fn append(pool: &SqlitePool, signal: &Signal) -> Result<i64, StorageError> {
        let signal_id = signal.id.as_deref().ok_or(StorageError::MissingId)?;
        let appended_at = signal.dispatched_at.ok_or(StorageError::NotDispatched)?;
        let payload = serde_json::to_string(signal)?;

        let seq = sqlx::query_scalar::<_, i64>(
            r#"
                INSERT INTO signals (signal_id, symbol, appended_at, payload)
                VALUES (?, ?, ?, ?)
                RETURNING seq
            "#,
        )
        .bind(signal_id)
        .bind(&signal.symbol)
        .bind(appended_at.to_rfc3339())
        .bind(payload)
        .fetch_one(pool)
        .await?;

        Ok(seq)
    }

    /// Whole partition in append order.
    pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Signal>, StorageError> {
        let payloads = sqlx::query_scalar::<_, String>("SELECT payload FROM signals ORDER BY seq ASC")
            .fetch_all(pool)
            .await?;
        decode(payloads)
    }

    /// Up to `limit` records, newest first.
    pub async fn fetch_latest(pool: &SqlitePool, limit: usize) -> Result<Vec<Signal>, StorageError> {
        let payloads = sqlx::query_scalar::<_, String>("SELECT payload FROM signals ORDER BY seq DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(pool)
            .await?;
        decode(payloads)
    }
}

fn decode(payloads: Vec<String>) -> Result<Vec<Signal>, StorageError> {
    payloads
        .iter()
        .map(|p| serde_json::from_str::<Signal>(p).map_err(StorageError::from))
        .collect()
}
