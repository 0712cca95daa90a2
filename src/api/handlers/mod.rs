pub mod health;
pub mod readings;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::{
    alert::{AlertController, AlertPolicy},
    config::Config,
    error::Result,
    ingest::IngestPipeline,
    notify::{notifier_from_config, Notifier},
    store::ReadingStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<IngestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Wire the store, alert controller and broadcast channel from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let notifier = notifier_from_config(&config.notification)?;
        Ok(Self::with_notifier(config, notifier))
    }

    pub fn with_notifier(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        let (broadcast_tx, _broadcast_rx) = broadcast::channel(config.server.broadcast_capacity);
        let alerts = AlertController::new(
            AlertPolicy::with_cooldown(config.alert.cooldown()),
            notifier,
        );

        let pipeline = IngestPipeline::new(
            Arc::new(ReadingStore::new()),
            Arc::new(alerts),
            broadcast_tx,
        );
        Self::new(Arc::new(pipeline))
    }
}
