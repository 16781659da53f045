use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Sends each event in order, logging failures instead of returning them.
    /// Domain events are emitted after the write has committed, so a closed
    /// channel must not turn a successful operation into an error.
    pub async fn send_all_or_log(&self, events: Vec<Event>) {
        for event in events {
            let kind = event.kind();
            if let Err(e) = self.send(event).await {
                warn!(error = %e, event = kind, "Failed to send domain event");
            }
        }
    }
}

/// Creates a bounded event channel
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Order ledger domain events.
///
/// Emission order for one acquisition: every `OrderDeactivated`, then
/// `OrderCreated`, then `OrderTotalRecomputed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        id: Uuid,
        order_id: String,
        billing_profile_id: Uuid,
        cart_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    OrderDeactivated {
        id: Uuid,
        cart_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    OrderTotalRecomputed {
        id: Uuid,
        total: Decimal,
        timestamp: DateTime<Utc>,
    },
    OrderStatusChanged {
        id: Uuid,
        old_status: String,
        new_status: String,
        timestamp: DateTime<Utc>,
    },
    /// A cart changed but did not map to exactly one order
    CartOrderMappingSkipped {
        cart_id: Uuid,
        matching_orders: u64,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::OrderDeactivated { .. } => "order_deactivated",
            Event::OrderTotalRecomputed { .. } => "order_total_recomputed",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::CartOrderMappingSkipped { .. } => "cart_order_mapping_skipped",
        }
    }
}

/// Drains the event channel, logging each event until every sender is gone.
/// Returns how many events were observed.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) -> usize {
    info!("Starting event processing loop");
    let mut seen = 0;

    while let Some(event) = rx.recv().await {
        seen += 1;
        match &event {
            Event::OrderCreated { id, order_id, .. } => {
                info!(id = %id, order_id = %order_id, "order created");
            }
            Event::OrderDeactivated { id, cart_id, .. } => {
                info!(id = %id, cart_id = %cart_id, "order deactivated");
            }
            Event::OrderTotalRecomputed { id, total, .. } => {
                info!(id = %id, total = %total, "order total recomputed");
            }
            Event::OrderStatusChanged {
                id,
                old_status,
                new_status,
                ..
            } => {
                info!(id = %id, old_status = %old_status, new_status = %new_status, "order status changed");
            }
            Event::CartOrderMappingSkipped {
                cart_id,
                matching_orders,
                ..
            } => {
                warn!(cart_id = %cart_id, matching_orders, "cart change not applied to any order");
            }
        }
    }

    info!(events = seen, "Event processing loop finished");
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deactivated() -> Event {
        Event::OrderDeactivated {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn events_are_delivered_in_send_order() {
        let (sender, mut rx) = channel(8);
        let first = deactivated();
        let second = Event::OrderTotalRecomputed {
            id: Uuid::new_v4(),
            total: Decimal::new(4999, 2),
            timestamp: Utc::now(),
        };
        sender
            .send_all_or_log(vec![first.clone(), second.clone()])
            .await;

        assert_eq!(rx.recv().await, Some(first));
        assert_eq!(rx.recv().await, Some(second));
    }

    #[tokio::test]
    async fn send_to_closed_channel_is_an_event_error() {
        let (sender, rx) = channel(1);
        drop(rx);
        let err = sender.send(deactivated()).await.unwrap_err();
        assert!(matches!(err, ServiceError::EventError(_)));
        // and the logging variant swallows it
        sender.send_all_or_log(vec![deactivated()]).await;
    }

    #[tokio::test]
    async fn process_events_counts_until_senders_drop() {
        let (sender, rx) = channel(4);
        let handle = tokio::spawn(process_events(rx));
        sender.send_all_or_log(vec![deactivated(), deactivated()]).await;
        drop(sender);
        assert_eq!(handle.await.unwrap(), 2);
    }
}
