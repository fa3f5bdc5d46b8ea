//! Health-event sink invoked on exclusion and recovery transitions.
//!
//! Callbacks run synchronously inside the rotator's critical section, so
//! implementations must not block. A callback that fails returns an error;
//! the rotator logs it and carries on with the state transition.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Error returned by a notifier callback.
pub type NotifyError = Box<dyn std::error::Error + Send + Sync>;

/// Observer of endpoint failure / recovery transitions.
pub trait HealthNotifier: Send + Sync {
    /// An endpoint failed a call and has been excluded.
    fn notify_failure(&self, endpoint: &str, cause: &TransportError) -> Result<(), NotifyError>;

    /// An endpoint's exclusion lifted and it is back in rotation.
    fn notify_recovery(&self, endpoint: &str) -> Result<(), NotifyError>;
}

/// A single health transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HealthEvent {
    Failure { endpoint: String, cause: String },
    Recovery { endpoint: String },
}

impl HealthEvent {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Failure { endpoint, .. } | Self::Recovery { endpoint } => endpoint,
        }
    }
}

/// Logs every transition through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl HealthNotifier for TracingNotifier {
    fn notify_failure(&self, endpoint: &str, cause: &TransportError) -> Result<(), NotifyError> {
        tracing::warn!(endpoint, error = %cause, "RPC endpoint failed");
        Ok(())
    }

    fn notify_recovery(&self, endpoint: &str) -> Result<(), NotifyError> {
        tracing::info!(endpoint, "RPC endpoint recovered");
        Ok(())
    }
}

/// Forwards transitions to an unbounded channel for asynchronous handling.
///
/// Events are enqueued in the order the rotator emits them, so a recovery is
/// never received before the failure it restores from.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<HealthEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HealthEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: HealthEvent) -> Result<(), NotifyError> {
        self.tx
            .send(event)
            .map_err(|e| format!("health event receiver dropped: {:?}", e.0).into())
    }
}

impl HealthNotifier for ChannelNotifier {
    fn notify_failure(&self, endpoint: &str, cause: &TransportError) -> Result<(), NotifyError> {
        self.forward(HealthEvent::Failure {
            endpoint: endpoint.to_string(),
            cause: cause.to_string(),
        })
    }

    fn notify_recovery(&self, endpoint: &str) -> Result<(), NotifyError> {
        self.forward(HealthEvent::Recovery { endpoint: endpoint.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_preserves_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier
            .notify_failure("https://a.example", &TransportError::Http("refused".into()))
            .unwrap();
        notifier.notify_recovery("https://a.example").unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            HealthEvent::Failure {
                endpoint: "https://a.example".into(),
                cause: "HTTP error: refused".into(),
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            HealthEvent::Recovery { endpoint: "https://a.example".into() }
        );
    }

    #[test]
    fn channel_notifier_reports_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        assert!(notifier.notify_recovery("https://a.example").is_err());
    }

    #[test]
    fn event_serializes_with_tag() {
        let ev = HealthEvent::Recovery { endpoint: "wss://b.example".into() };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "recovery");
        assert_eq!(ev.endpoint(), "wss://b.example");
    }
}
