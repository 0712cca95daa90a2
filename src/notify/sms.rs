use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error};

use super::Notifier;
use crate::config::NotificationConfig;
use crate::error::DeliveryError;

/// Client for a Twilio-compatible messages API.
#[derive(Debug, Clone)]
pub struct SmsNotifier {
    client: reqwest::Client,
    endpoint: String,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
}

impl SmsNotifier {
    pub fn new(
        api_base: &str,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let account_sid = account_sid.into();
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: messages_endpoint(api_base, &account_sid),
            account_sid,
            auth_token: auth_token.into(),
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn from_config(config: &NotificationConfig) -> Result<Self, DeliveryError> {
        Self::new(
            &config.api_base,
            config.account_sid.clone().unwrap_or_default(),
            config.auth_token.clone().unwrap_or_default(),
            config.from.clone().unwrap_or_default(),
            config.to.clone().unwrap_or_default(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn messages_endpoint(api_base: &str, account_sid: &str) -> String {
    format!(
        "{}/2010-04-01/Accounts/{}/Messages.json",
        api_base.trim_end_matches('/'),
        account_sid
    )
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, message: &str) -> Result<(), DeliveryError> {
        let params = [
            ("To", self.to.as_str()),
            ("From", self.from.as_str()),
            ("Body", message),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "SMS gateway rejected alert");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = %self.to, "alert handed to SMS gateway");
        Ok(())
    }
}
