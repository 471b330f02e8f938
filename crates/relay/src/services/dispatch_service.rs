use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use common::models::Signal;
use serde::{Deserialize, Serialize};
use storage::SignalLog;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::webhook_service::SignalNotifier;
use crate::stages::StageError;

pub const MAX_RECENT: usize = 100;

/// Secondary result of a dispatch. Delivery runs after the receipt is
/// returned, so it never affects whether the append counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NotificationOutcome {
    Skipped,
    Queued,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub status: String,
    pub id: String,
    pub dispatched_at: DateTime<Utc>,
    pub partition: NaiveDate,
    pub seq: i64,
    pub notification: NotificationOutcome,
}

pub struct SignalDispatcher {
    log: Arc<SignalLog>,
    notifier: Option<Arc<dyn SignalNotifier>>,
    deliveries: Mutex<JoinSet<()>>,
}

impl SignalDispatcher {
    pub fn new(log: Arc<SignalLog>) -> Self {
        Self {
            log,
            notifier: None,
            deliveries: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SignalNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Stamps id and dispatch time, appends, and returns once the record is
    /// durable. The notifier is called afterwards on its own task.
    pub async fn dispatch(&self, mut signal: Signal) -> Result<DispatchReceipt, StageError> {
        signal.validate()?;
        if signal.id.is_none() {
            signal.id = Some(Uuid::new_v4().to_string());
        }
        let dispatched_at = Utc::now();
        signal.dispatched_at = Some(dispatched_at);

        let receipt = self.log.append(&signal).await?;
        info!("{}", signal.alert());

        let notification = match &self.notifier {
            None => NotificationOutcome::Skipped,
            Some(notifier) => {
                self.deliver(notifier.clone(), signal);
                NotificationOutcome::Queued
            }
        };

        Ok(DispatchReceipt {
            status: "persisted".to_string(),
            id: receipt.id,
            dispatched_at,
            partition: receipt.date,
            seq: receipt.seq,
            notification,
        })
    }

    fn deliver(&self, notifier: Arc<dyn SignalNotifier>, signal: Signal) {
        let mut deliveries = match self.deliveries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // reap finished deliveries
        while deliveries.try_join_next().is_some() {}

        deliveries.spawn(async move {
            let id = signal.id.as_deref().unwrap_or("-");
            match notifier.notify(&signal).await {
                Ok(()) => debug!("Signal {} delivered to notifier", id),
                Err(e) => warn!("Signal {} persisted but notification failed: {}", id, e),
            }
        });
    }

    /// Waits for every queued notification to finish.
    pub async fn drain_notifications(&self) {
        let mut pending = {
            let mut deliveries = match self.deliveries.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *deliveries)
        };
        while pending.join_next().await.is_some() {}
    }

    /// Newest first, at most [`MAX_RECENT`] whatever the caller asks for.
    pub async fn recent(&self, limit: usize) -> Result<Vec<Signal>, StageError> {
        Ok(self.log.recent(limit.min(MAX_RECENT)).await?)
    }

    pub async fn for_date(&self, date: NaiveDate) -> Result<Vec<Signal>, StageError> {
        Ok(self.log.for_date(date).await?)
    }
}
