use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the services after state changes commit.
///
/// Consumers get at-most-once delivery over an in-process channel; none
/// of the core invariants depend on an event being observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Inventory events
    StockReserved {
        item_id: Uuid,
        quantity: i32,
        order_id: Uuid,
    },
    StockReleased {
        item_id: Uuid,
        quantity: i32,
        order_id: Uuid,
    },

    // Booking events
    BookingCreated(Uuid),
    BookingConfirmed(Uuid),
    BookingCancelled(Uuid),
    BookingRescheduled(Uuid),

    // Payment events
    PaymentCreated(Uuid),
    PaymentApproved(Uuid),
    PaymentRejected(Uuid),
    PaymentReconciled {
        payment_id: Uuid,
        external_status: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging instead of failing when the channel is
    /// full or closed.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("Event channel closed, dropping event: {}", e);
        }
    }
}

/// Creates a bounded event channel.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Runs until every
/// sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    %order_id,
                    %old_status,
                    %new_status,
                    "Order status changed"
                );
            }
            Event::PaymentReconciled {
                payment_id,
                external_status,
            } => {
                info!(%payment_id, %external_status, "Payment reconciled from gateway");
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_and_receive() {
        let (tx, mut rx) = event_channel(8);
        let id = Uuid::new_v4();
        tx.send(Event::OrderCreated(id)).await;
        match rx.recv().await {
            Some(Event::OrderCreated(got)) => assert_eq!(got, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_does_not_panic() {
        let (tx, rx) = event_channel(1);
        drop(rx);
        tx.send(Event::OrderCancelled(Uuid::new_v4())).await;
    }
}
