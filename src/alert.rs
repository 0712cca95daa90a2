//! Critical-temperature alerting.
//!
//! The controller is armed until a notification for the current excursion into
//! the critical range has been delivered, and re-armed by the first sample seen
//! outside that range.
//!
//! Delivery runs as a spawned task and only its completion marks the alert as
//! sent. While a delivery is in flight the controller is still armed, so a
//! second critical sample arriving in that window dispatches again. There is no
//! in-flight guard here; callers that need exactly-once delivery per excursion
//! must serialize around [`AlertController::evaluate`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::notify::Notifier;

pub const CRITICAL_MIN: f64 = 30.0;
pub const CRITICAL_MAX: f64 = 35.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    /// Inclusive lower bound of the critical range, in degrees Celsius
    pub critical_min: f64,
    /// Inclusive upper bound of the critical range, in degrees Celsius
    pub critical_max: f64,
    /// Zero disables the cooldown
    pub cooldown: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            critical_min: CRITICAL_MIN,
            critical_max: CRITICAL_MAX,
            cooldown: Duration::ZERO,
        }
    }
}

impl AlertPolicy {
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            ..Self::default()
        }
    }

    pub fn is_critical(&self, temperature: f64) -> bool {
        (self.critical_min..=self.critical_max).contains(&temperature)
    }

    fn cooldown_passed(&self, last_alert_at: Option<Instant>, now: Instant) -> bool {
        if self.cooldown.is_zero() {
            return true;
        }
        match last_alert_at {
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
            None => true,
        }
    }

    pub fn message(&self, temperature: f64) -> String {
        format!(
            "⚠️ Temperature alert: {}°C is inside the critical range [{}, {}]",
            temperature, self.critical_min, self.critical_max
        )
    }
}

#[derive(Debug, Default)]
struct AlertState {
    alert_sent: bool,
    last_alert_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertSnapshot {
    pub alert_sent: bool,
    pub last_alert_at: Option<Instant>,
}

pub struct AlertController {
    policy: AlertPolicy,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<AlertState>>,
}

impl AlertController {
    pub fn new(policy: AlertPolicy, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            policy,
            notifier,
            state: Arc::new(Mutex::new(AlertState::default())),
        }
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        let state = lock(&self.state);
        AlertSnapshot {
            alert_sent: state.alert_sent,
            last_alert_at: state.last_alert_at,
        }
    }

    /// Feed one temperature sample.
    ///
    /// Returns the handle of the delivery task when a notification was
    /// dispatched. Dropping the handle does not cancel delivery.
    pub fn evaluate(&self, temperature: f64) -> Option<JoinHandle<()>> {
        if !temperature.is_finite() {
            debug!("no usable temperature, alert state unchanged");
            return None;
        }

        let mut state = lock(&self.state);

        if !self.policy.is_critical(temperature) {
            if state.alert_sent {
                info!(temperature, "temperature left critical range, alert re-armed");
            }
            state.alert_sent = false;
            return None;
        }

        let now = Instant::now();
        if state.alert_sent || !self.policy.cooldown_passed(state.last_alert_at, now) {
            debug!(
                temperature,
                alert_sent = state.alert_sent,
                "critical temperature, alert suppressed"
            );
            return None;
        }
        drop(state);

        warn!(temperature, "critical temperature, dispatching alert");
        let message = self.policy.message(temperature);
        let notifier = Arc::clone(&self.notifier);
        let state = Arc::clone(&self.state);

        Some(tokio::spawn(async move {
            match notifier.send(&message).await {
                Ok(()) => {
                    let mut state = lock(&state);
                    state.alert_sent = true;
                    state.last_alert_at = Some(Instant::now());
                    info!(temperature, "alert delivered");
                }
                Err(e) => {
                    error!(
                        temperature,
                        error = %e,
                        "alert delivery failed, next critical sample retries"
                    );
                }
            }
        }))
    }
}

fn lock(state: &Mutex<AlertState>) -> MutexGuard<'_, AlertState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::notify::MockNotifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn controller(mock: MockNotifier, policy: AlertPolicy) -> AlertController {
        AlertController::new(policy, Arc::new(mock))
    }

    async fn settle(handle: Option<JoinHandle<()>>) {
        handle.expect("expected a dispatch").await.unwrap();
    }

    #[test]
    fn test_critical_window_is_inclusive() {
        let policy = AlertPolicy::default();
        assert!(policy.is_critical(30.0));
        assert!(policy.is_critical(32.5));
        assert!(policy.is_critical(35.0));
        assert!(!policy.is_critical(29.999));
        assert!(!policy.is_critical(35.001));
    }

    #[test]
    fn test_message_contains_temperature() {
        let msg = AlertPolicy::default().message(32.0);
        assert!(msg.contains("32°C"), "{}", msg);
    }

    #[tokio::test]
    async fn test_excursion_lifecycle() {
        let mut mock = MockNotifier::new();
        mock.expect_send()
            .withf(|msg| msg.contains("32") || msg.contains("31"))
            .times(2)
            .returning(|_| Ok(()));
        let alerts = controller(mock, AlertPolicy::default());

        settle(alerts.evaluate(32.0)).await;
        assert!(alerts.snapshot().alert_sent);
        assert!(alerts.snapshot().last_alert_at.is_some());

        assert!(alerts.evaluate(33.0).is_none());
        assert!(alerts.snapshot().alert_sent);

        assert!(alerts.evaluate(36.0).is_none());
        assert!(!alerts.snapshot().alert_sent);

        settle(alerts.evaluate(31.0)).await;
        assert!(alerts.snapshot().alert_sent);
    }

    #[tokio::test]
    async fn test_failed_delivery_stays_armed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mock = MockNotifier::new();
        mock.expect_send().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DeliveryError::Rejected {
                    status: 503,
                    body: "unavailable".into(),
                })
            } else {
                Ok(())
            }
        });
        let alerts = controller(mock, AlertPolicy::default());

        settle(alerts.evaluate(34.0)).await;
        assert!(!alerts.snapshot().alert_sent);
        assert!(alerts.snapshot().last_alert_at.is_none());

        settle(alerts.evaluate(34.0)).await;
        assert!(alerts.snapshot().alert_sent);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_finite_sample_is_noop() {
        let mut mock = MockNotifier::new();
        mock.expect_send().times(1).returning(|_| Ok(()));
        let alerts = controller(mock, AlertPolicy::default());

        settle(alerts.evaluate(32.0)).await;

        // NaN neither re-arms nor dispatches
        assert!(alerts.evaluate(f64::NAN).is_none());
        assert!(alerts.snapshot().alert_sent);
    }

    #[tokio::test]
    async fn test_outside_window_never_dispatches() {
        let mut mock = MockNotifier::new();
        mock.expect_send().never();
        let alerts = controller(mock, AlertPolicy::default());

        for t in [-10.0, 19.0, 29.999, 35.001, 80.0] {
            assert!(alerts.evaluate(t).is_none());
        }
        assert!(!alerts.snapshot().alert_sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_gates_the_next_excursion() {
        let mut mock = MockNotifier::new();
        mock.expect_send().times(2).returning(|_| Ok(()));
        let alerts = controller(mock, AlertPolicy::with_cooldown(Duration::from_secs(600)));

        settle(alerts.evaluate(32.0)).await;

        // Excursion ends, re-enters within the cooldown: armed but suppressed
        assert!(alerts.evaluate(25.0).is_none());
        assert!(alerts.evaluate(32.0).is_none());
        assert!(!alerts.snapshot().alert_sent);

        tokio::time::advance(Duration::from_secs(601)).await;
        settle(alerts.evaluate(32.0)).await;
        assert!(alerts.snapshot().alert_sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_boundary_is_exclusive() {
        let mut mock = MockNotifier::new();
        mock.expect_send().times(1).returning(|_| Ok(()));
        let alerts = controller(mock, AlertPolicy::with_cooldown(Duration::from_secs(60)));

        settle(alerts.evaluate(30.0)).await;
        alerts.evaluate(20.0);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(alerts.evaluate(30.0).is_none());
    }
}
