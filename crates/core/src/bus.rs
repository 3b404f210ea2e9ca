//! Best-effort broadcast of notifications to attached clients.
//!
//! Only clients subscribed at publish time receive a notification. There is
//! no queueing for late subscribers and no retry; a subscriber that falls
//! behind the channel capacity loses the oldest messages.

use tokio::sync::broadcast;

use crate::message::Notification;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Notification>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Attach a client.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Send to every attached client. Returns how many were attached.
    pub fn publish(&self, notification: Notification) -> usize {
        match self.tx.send(notification) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(dropped)) => {
                tracing::trace!(?dropped, "no clients attached");
                0
            }
        }
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_attached_clients() {
        let bus = NotificationBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(Notification::CacheCleared), 2);
        assert_eq!(a.recv().await.unwrap(), Notification::CacheCleared);
        assert_eq!(b.recv().await.unwrap(), Notification::CacheCleared);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_notifications() {
        let bus = NotificationBus::default();
        assert_eq!(bus.publish(Notification::UpdateStarted), 0);

        let mut late = bus.subscribe();
        bus.publish(Notification::UpdateComplete);
        assert_eq!(late.recv().await.unwrap(), Notification::UpdateComplete);
        assert!(late.try_recv().is_err());
    }
}
