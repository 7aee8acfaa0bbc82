//! Cart change notifications.

use tokio::sync::broadcast;
use turbo_commerce::{Money, OrderId};

/// Something observers of the cart may want to refresh on.
#[derive(Debug, Clone, PartialEq)]
pub enum CartEvent {
    /// Lines changed.
    Changed { item_count: i64, total: Money },
    /// The cart was emptied after an order.
    Cleared,
    /// An order was recorded.
    OrderPlaced { order_id: OrderId },
}

/// Broadcast bus for [`CartEvent`]s.
#[derive(Debug, Clone)]
pub struct CartEvents {
    tx: broadcast::Sender<CartEvent>,
}

impl CartEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn emit(&self, event: CartEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for CartEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        CartEvents::default().emit(CartEvent::Cleared);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let events = CartEvents::default();
        let mut rx = events.subscribe();
        events.emit(CartEvent::OrderPlaced {
            order_id: OrderId::new("ord_1"),
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            CartEvent::OrderPlaced {
                order_id: OrderId::new("ord_1")
            }
        );
    }
}
