//! # Mutation Events & Notifications
//!
//! The controller reports what happened as [`MutationEvent`]s; turning an
//! event into user-facing toast copy is the job of the [`Notifier`] adapter.
//! Business logic never constructs a [`Notification`] directly.
//!
//! ```text
//! OptimisticController ──MutationEvent──► MutationObserver
//!                                              │
//!                                        Notifier (adapter)
//!                                              │
//!                                         Notification
//!                                              ▼
//!                                       NotificationSink (UI, tests)
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use sodi_core::RecordId;

// =============================================================================
// Mutation Events
// =============================================================================

/// What kind of mutation ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOp {
    Create,
    Update,
    Delete,
}

impl MutationOp {
    fn verb(&self) -> &'static str {
        match self {
            MutationOp::Create => "created",
            MutationOp::Update => "updated",
            MutationOp::Delete => "deleted",
        }
    }
}

/// How the mutation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The store accepted the mutation; the namespace was invalidated.
    Committed,
    /// The store refused or failed; the optimistic write was rolled back
    /// (or the rollback was skipped in favour of a younger write).
    RolledBack { reason: String },
}

/// Emitted once per completed mutation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub op: MutationOp,
    pub collection: String,
    pub id: RecordId,
    pub outcome: MutationOutcome,
}

impl MutationEvent {
    pub fn is_committed(&self) -> bool {
        matches!(self.outcome, MutationOutcome::Committed)
    }
}

/// Observer for completed mutations (implemented by the notification
/// adapter, or by test harnesses directly).
pub trait MutationObserver: Send + Sync {
    fn on_mutation(&self, event: &MutationEvent);
}

/// No-op observer for callers that don't surface mutations anywhere.
pub struct NoOpObserver;

impl MutationObserver for NoOpObserver {
    fn on_mutation(&self, _event: &MutationEvent) {}
}

// =============================================================================
// Notifications
// =============================================================================

/// Notification severity, mapped to toast styling by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
}

/// Notification display priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    High,
    Medium,
    Low,
}

/// User-facing notification derived from a mutation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub priority: NotificationPriority,
}

/// Delivery seam for notifications. Fire-and-forget: sinks must not block
/// and must not fail the mutation that produced the notification.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: Notification);
}

/// Sink that forwards notifications over an unbounded channel. Used by
/// tests and by frontends that drain notifications from an event loop.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn deliver(&self, notification: Notification) {
        // A closed receiver means nobody is listening anymore; that's fine.
        let _ = self.tx.send(notification);
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Maps mutation events to notifications and hands them to a sink.
///
/// Failed mutations are high priority (the operator must retry), committed
/// ones low (confirmation only).
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Notifier { sink }
    }
}

impl MutationObserver for Notifier {
    fn on_mutation(&self, event: &MutationEvent) {
        let notification = match &event.outcome {
            MutationOutcome::Committed => Notification {
                kind: NotificationKind::Success,
                message: format!("{} record {}", event.collection, event.op.verb()),
                priority: NotificationPriority::Low,
            },
            MutationOutcome::RolledBack { reason } => Notification {
                kind: NotificationKind::Error,
                message: format!(
                    "Could not apply {} change: {reason}. Your view was restored.",
                    event.collection
                ),
                priority: NotificationPriority::High,
            },
        };
        self.sink.deliver(notification);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn event(outcome: MutationOutcome) -> MutationEvent {
        MutationEvent {
            op: MutationOp::Update,
            collection: "sales".to_string(),
            id: RecordId::from("sale-1"),
            outcome,
        }
    }

    #[test]
    fn test_committed_maps_to_low_priority_success() {
        let (sink, mut rx) = ChannelSink::new();
        let notifier = Notifier::new(Arc::new(sink));

        notifier.on_mutation(&event(MutationOutcome::Committed));

        let n = rx.try_recv().unwrap();
        assert_eq!(n.kind, NotificationKind::Success);
        assert_eq!(n.priority, NotificationPriority::Low);
        assert!(n.message.contains("sales"));
    }

    #[test]
    fn test_rollback_maps_to_high_priority_error() {
        let (sink, mut rx) = ChannelSink::new();
        let notifier = Notifier::new(Arc::new(sink));

        notifier.on_mutation(&event(MutationOutcome::RolledBack {
            reason: "network down".to_string(),
        }));

        let n = rx.try_recv().unwrap();
        assert_eq!(n.kind, NotificationKind::Error);
        assert_eq!(n.priority, NotificationPriority::High);
        assert!(n.message.contains("network down"));
        assert!(n.message.contains("restored"));
    }

    #[test]
    fn test_sink_with_dropped_receiver_does_not_panic() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.deliver(Notification {
            kind: NotificationKind::Success,
            message: "x".to_string(),
            priority: NotificationPriority::Low,
        });
    }
}
