use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::alert::AlertController;
use crate::error::Result;
use crate::reading::{validate_payload, Reading};
use crate::store::ReadingStore;

/// Event name carried by every broadcast reading.
pub const SENSOR_EVENT: &str = "sensor-data";

/// Validate, stamp, derive, store, alert, broadcast.
pub struct IngestPipeline {
    store: Arc<ReadingStore>,
    alerts: Arc<AlertController>,
    broadcast_tx: broadcast::Sender<Arc<Reading>>,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<ReadingStore>,
        alerts: Arc<AlertController>,
        broadcast_tx: broadcast::Sender<Arc<Reading>>,
    ) -> Self {
        Self {
            store,
            alerts,
            broadcast_tx,
        }
    }

    /// Process one raw payload. A rejected payload leaves the stored reading
    /// and the alert state untouched. Alert delivery is not awaited.
    pub fn ingest(&self, payload: Value) -> Result<Arc<Reading>> {
        let fields = validate_payload(payload)?;
        let reading = Arc::new(Reading::from_fields(fields, Utc::now()));

        self.store.set(Arc::clone(&reading));

        if let Some(temperature) = reading.temperature() {
            // Fire-and-forget: the handle is dropped, the task keeps running
            let _ = self.alerts.evaluate(temperature);
        }

        self.broadcast(&reading);

        debug!(
            temp_level = ?reading.status.temp_level,
            day_or_night = ?reading.status.day_or_night,
            "reading ingested"
        );
        Ok(reading)
    }

    pub fn latest(&self) -> Option<Arc<Reading>> {
        self.store.get()
    }

    pub fn alerts(&self) -> &AlertController {
        &self.alerts
    }

    pub fn observer_count(&self) -> usize {
        self.broadcast_tx.receiver_count()
    }

    /// Join the broadcast channel. The latest reading, if any, is handed to
    /// this subscriber alone through [`Subscription::take_replay`].
    pub fn subscribe(&self) -> Subscription {
        // Subscribe before reading the store so nothing stored afterwards is missed
        let rx = self.broadcast_tx.subscribe();
        let replay = self.store.get();
        Subscription {
            pending_replay: replay.clone(),
            replayed: replay,
            rx,
        }
    }

    fn broadcast(&self, reading: &Arc<Reading>) {
        match self.broadcast_tx.send(Arc::clone(reading)) {
            Ok(count) => debug!("Broadcast reading to {} observers", count),
            Err(_) => debug!("No observers connected, skipping broadcast"),
        }
    }
}

pub struct Subscription {
    pending_replay: Option<Arc<Reading>>,
    replayed: Option<Arc<Reading>>,
    rx: broadcast::Receiver<Arc<Reading>>,
}

impl Subscription {
    pub fn take_replay(&mut self) -> Option<Arc<Reading>> {
        self.pending_replay.take()
    }

    /// Next live reading. A broadcast of the exact reading that was replayed
    /// on join is skipped once, so a join racing an ingest sees it only once.
    pub async fn recv(&mut self) -> std::result::Result<Arc<Reading>, RecvError> {
        loop {
            let reading = self.rx.recv().await?;
            match &self.replayed {
                Some(replayed) if Arc::ptr_eq(replayed, &reading) => {
                    self.replayed = None;
                }
                _ => return Ok(reading),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertPolicy;
    use crate::error::AppError;
    use crate::notify::MockNotifier;
    use crate::status::TempLevel;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    fn pipeline(mock: MockNotifier) -> IngestPipeline {
        let (tx, _rx) = broadcast::channel(16);
        IngestPipeline::new(
            Arc::new(ReadingStore::new()),
            Arc::new(AlertController::new(AlertPolicy::default(), Arc::new(mock))),
            tx,
        )
    }

    fn quiet() -> MockNotifier {
        let mut mock = MockNotifier::new();
        mock.expect_send().never();
        mock
    }

    #[tokio::test]
    async fn test_ingest_stores_and_broadcasts() {
        let pipeline = pipeline(quiet());
        let mut sub = pipeline.subscribe();
        assert!(sub.take_replay().is_none());

        let reading = pipeline
            .ingest(json!({ "ds18b20_temp": 27.0, "ldr_percent": 10 }))
            .unwrap();

        assert_eq!(reading.status.temp_level, TempLevel::Hot);
        assert!(Arc::ptr_eq(&pipeline.latest().unwrap(), &reading));

        let received = sub.recv().await.unwrap();
        assert!(Arc::ptr_eq(&received, &reading));
    }

    #[tokio::test]
    async fn test_invalid_payload_changes_nothing() {
        let pipeline = pipeline(quiet());
        let first = pipeline.ingest(json!({ "temperature": 21 })).unwrap();
        let mut sub = pipeline.subscribe();
        sub.take_replay();

        for payload in [json!(null), json!(12.5), json!(["a"])] {
            let result = pipeline.ingest(payload);
            assert!(matches!(result, Err(AppError::Validation(_))));
        }

        assert!(Arc::ptr_eq(&pipeline.latest().unwrap(), &first));
        assert!(matches!(sub.rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_join_replays_latest_only_to_new_subscriber() {
        let pipeline = pipeline(quiet());
        let mut existing = pipeline.subscribe();

        let reading = pipeline.ingest(json!({ "ds18b20_temp": 22.0 })).unwrap();
        assert!(Arc::ptr_eq(&existing.recv().await.unwrap(), &reading));

        let mut joined = pipeline.subscribe();
        let replay = joined.take_replay().unwrap();
        assert!(Arc::ptr_eq(&replay, &reading));
        assert!(joined.take_replay().is_none());

        // Joining does not re-broadcast anything to existing subscribers
        assert!(matches!(existing.rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_replayed_reading_is_not_delivered_twice() {
        let pipeline = pipeline(quiet());

        // Simulate the race: stored before the join, broadcast after it
        let reading = Arc::new(Reading::from_fields(
            serde_json::from_value(json!({ "ds18b20_temp": 20.0 })).unwrap(),
            Utc::now(),
        ));
        pipeline.store.set(Arc::clone(&reading));

        let mut sub = pipeline.subscribe();
        assert!(Arc::ptr_eq(&sub.take_replay().unwrap(), &reading));

        pipeline.broadcast(&reading);
        let next = pipeline.ingest(json!({ "ds18b20_temp": 21.0 })).unwrap();

        let received = sub.recv().await.unwrap();
        assert!(Arc::ptr_eq(&received, &next));
    }

    #[tokio::test]
    async fn test_critical_reading_triggers_alert_without_blocking() {
        let mut mock = MockNotifier::new();
        mock.expect_send().times(1).returning(|_| Ok(()));
        let pipeline = pipeline(mock);

        pipeline.ingest(json!({ "ds18b20_temp": "32.5" })).unwrap();

        // Delivery completes on its own task
        for _ in 0..100 {
            if pipeline.alerts().snapshot().alert_sent {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(pipeline.alerts().snapshot().alert_sent);
    }

    #[tokio::test]
    async fn test_missing_temperature_skips_alerting() {
        let pipeline = pipeline(quiet());
        pipeline
            .ingest(json!({ "ldr_percent": 90, "ds18b20_temp": "error" }))
            .unwrap();
        assert!(!pipeline.alerts().snapshot().alert_sent);
    }
}
