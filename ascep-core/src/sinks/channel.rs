use ascep_sdk::objects::{StreamMessage, Topic};
use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{BroadcastSink, SinkError};

/// In-process broadcast that WebSocket subscribers attach to.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<StreamMessage>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl BroadcastSink for ChannelBroadcaster {
    fn name(&self) -> &str {
        "channel"
    }

    async fn publish(&self, _topic: Topic, message: &StreamMessage) -> Result<(), SinkError> {
        // An error only means nobody is subscribed right now.
        let _ = self.tx.send(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_messages() {
        let broadcaster = ChannelBroadcaster::new(8);
        broadcaster
            .publish(Topic::Logs, &StreamMessage::Lagged { skipped: 0 })
            .await
            .unwrap();

        let mut rx = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);
        let message = StreamMessage::Lagged { skipped: 1 };
        broadcaster.publish(Topic::Logs, &message).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), message);
    }
}
