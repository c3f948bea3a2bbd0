//! In-process change feed for case row mutations.
//!
//! Every write path publishes a before/after row image after the database
//! write succeeds, so subscribers observe both sides of a status
//! transition without querying.

use db::models::case::Case;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum CaseOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CaseEvent {
    pub op: CaseOp,
    pub before: Option<Case>,
    pub after: Option<Case>,
}

impl CaseEvent {
    pub fn inserted(after: Case) -> Self {
        Self {
            op: CaseOp::Insert,
            before: None,
            after: Some(after),
        }
    }

    pub fn updated(before: Case, after: Case) -> Self {
        Self {
            op: CaseOp::Update,
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn deleted(before: Case) -> Self {
        Self {
            op: CaseOp::Delete,
            before: Some(before),
            after: None,
        }
    }
}

/// Broadcast bus carrying [`CaseEvent`]s. Cloning shares the same channel.
#[derive(Clone)]
pub struct CaseEvents {
    tx: broadcast::Sender<CaseEvent>,
}

impl CaseEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaseEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: CaseEvent) {
        // Send only fails when no receiver is subscribed; the event is
        // then irrelevant anyway.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::models::case::{CasePriority, CaseStatus};
    use uuid::Uuid;

    use super::*;

    fn sample_case(status: CaseStatus) -> Case {
        let now = Utc::now();
        Case {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            technician_id: None,
            title: "Ants in kitchen".to_string(),
            description: None,
            address: None,
            pest_type: Some("ants".to_string()),
            status,
            priority: CasePriority::Normal,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let events = CaseEvents::new(8);
        let mut rx = events.subscribe();

        let case = sample_case(CaseStatus::Requested);
        events.publish(CaseEvent::inserted(case.clone()));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.op, CaseOp::Insert);
        assert_eq!(received.after.unwrap().id, case.id);
        assert!(received.before.is_none());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let events = CaseEvents::new(8);
        events.publish(CaseEvent::deleted(sample_case(CaseStatus::Cancelled)));
    }

    #[tokio::test]
    async fn test_update_event_carries_both_images() {
        let events = CaseEvents::new(8);
        let mut rx = events.subscribe();

        let before = sample_case(CaseStatus::Requested);
        let mut after = before.clone();
        after.status = CaseStatus::Scheduled;
        events.publish(CaseEvent::updated(before.clone(), after));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.before.unwrap().status, CaseStatus::Requested);
        assert_eq!(received.after.unwrap().status, CaseStatus::Scheduled);
    }
}
