use tokio::sync::broadcast;

use crate::models::PlayerEvent;

const CHANNEL_CAPACITY: usize = 64;

/// Fan-out hub for player lifecycle events.
///
/// Each dashboard subscriber holds its own [`broadcast::Receiver`]; emission
/// order is preserved per subscriber, nothing is guaranteed across
/// subscribers. A subscriber that stops polling falls behind and observes a
/// `Lagged` gap instead of blocking the publisher.
#[derive(Clone)]
pub struct PlayerEvents {
    tx: broadcast::Sender<PlayerEvent>,
}

impl PlayerEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: PlayerEvent) {
        // Err means no subscriber is currently listening; events are ephemeral
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for PlayerEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn subscribers_see_events_in_emission_order() {
        let events = PlayerEvents::new();
        let mut rx = events.subscribe();

        events.publish(PlayerEvent::Started);
        events.publish(PlayerEvent::Paused);
        events.publish(PlayerEvent::Stopped);

        assert_eq!(rx.recv().await.unwrap(), PlayerEvent::Started);
        assert_eq!(rx.recv().await.unwrap(), PlayerEvent::Paused);
        assert_eq!(rx.recv().await.unwrap(), PlayerEvent::Stopped);
    }

    #[tokio::test]
    async fn each_subscriber_gets_its_own_stream() {
        let events = PlayerEvents::new();
        let mut a = events.subscribe();
        let mut b = events.subscribe();
        assert_eq!(events.subscriber_count(), 2);

        events.publish(PlayerEvent::Started);

        assert_eq!(a.recv().await.unwrap(), PlayerEvent::Started);
        assert_eq!(b.recv().await.unwrap(), PlayerEvent::Started);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let events = PlayerEvents::new();
        events.publish(PlayerEvent::Quit);
        assert_eq!(events.subscriber_count(), 0);
    }
}
