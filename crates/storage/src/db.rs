use chrono::NaiveDate;
use sqlx::sqlite::{self, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

const PARTITION_PREFIX: &str = "signals_";
const PARTITION_SUFFIX: &str = ".db";

pub fn partition_file_name(date: NaiveDate) -> String {
    format!("{}{}{}", PARTITION_PREFIX, date.format("%Y-%m-%d"), PARTITION_SUFFIX)
}

pub fn partition_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(partition_file_name(date))
}

/// Inverse of [`partition_file_name`]; anything else in the directory
/// (WAL/SHM side files included) yields `None`.
pub fn parse_partition_file_name(name: &str) -> Option<NaiveDate> {
    let date = name.strip_prefix(PARTITION_PREFIX)?.strip_suffix(PARTITION_SUFFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn connect_options(path: &Path, create: bool) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .journal_mode(sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlite::SqliteSynchronous::Normal)
        .busy_timeout(StdDuration::from_secs(30))
        .statement_cache_capacity(100)
}

/// Single-connection pool owned by the partition's writer task.
pub async fn open_writer_pool(dir: &Path, date: NaiveDate) -> Result<SqlitePool, sqlx::Error> {
    let options = connect_options(&partition_path(dir, date), true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    let schema = include_str!("../../../sql/schema.sql");
    sqlx::raw_sql(schema).execute(&pool).await?;
    Ok(pool)
}

/// Short-lived pool for one read; the caller closes it when done.
pub async fn open_reader_pool(dir: &Path, date: NaiveDate) -> Result<SqlitePool, sqlx::Error> {
    let options = connect_options(&partition_path(dir, date), false);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}
