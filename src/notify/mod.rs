pub mod sms;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::NotificationConfig;
use crate::error::{AppError, DeliveryError, Result};

pub use sms::SmsNotifier;

/// Out-of-band delivery of an alert message to the configured recipient.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> std::result::Result<(), DeliveryError>;
}

/// Stand-in used when no gateway credentials are configured.
#[derive(Debug, Default, Clone)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, message: &str) -> std::result::Result<(), DeliveryError> {
        warn!(alert = %message, "notification gateway not configured, alert not delivered");
        Ok(())
    }
}

pub fn notifier_from_config(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    if !config.is_configured() {
        warn!("Notification credentials missing, alerts will only be logged");
        return Ok(Arc::new(DisabledNotifier));
    }

    let notifier = SmsNotifier::from_config(config)
        .map_err(|e| AppError::Config(format!("cannot build notification client: {}", e)))?;
    info!(api_base = %config.api_base, "SMS notifications enabled");
    Ok(Arc::new(notifier))
}
