//! Broadcast channel carrying state updates to UI subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use super::StateUpdate;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEnvelope {
    pub thread_id: String,
    /// Per-thread sequence number, strictly increasing.
    pub seq: u64,
    pub update: StateUpdate,
    pub emitted_at: DateTime<Utc>,
}

/// Fan-out of `StateEnvelope`s. Lagging receivers drop the oldest events;
/// the authoritative projection is returned with every turn.
#[derive(Clone)]
pub struct StateChannel {
    sender: broadcast::Sender<StateEnvelope>,
}

impl StateChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, thread_id: &str, seq: u64, update: StateUpdate) {
        let envelope = StateEnvelope {
            thread_id: thread_id.to_string(),
            seq,
            update,
            emitted_at: Utc::now(),
        };

        // No subscribers is fine: the projection still carries the update.
        let receivers = self.sender.send(envelope).unwrap_or(0);
        trace!(thread_id, seq, receivers, "State update published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for StateChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_updates_in_order() {
        let channel = StateChannel::default();
        let mut rx = channel.subscribe();

        channel.publish("t1", 1, StateUpdate::ResearchStarted { company_name: "Apple Inc.".into() });
        channel.publish("t1", 2, StateUpdate::AnalysisReady {
            company_name: "Apple Inc.".into(),
            content: "text".into(),
        });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert!(matches!(second.update, StateUpdate::AnalysisReady { .. }));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let channel = StateChannel::new(4);
        channel.publish("t1", 1, StateUpdate::CompanyCardHidden);
    }
}
