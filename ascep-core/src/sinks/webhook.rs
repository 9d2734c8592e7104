use std::time::Duration;

use ascep_sdk::objects::{StreamMessage, Topic};
use async_trait::async_trait;
use tracing::debug;

use super::{BroadcastSink, SinkError};

const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs each message as JSON to a single URL.
#[derive(Debug, Clone)]
pub struct WebhookBroadcaster {
    name: String,
    url: String,
    /// Empty means every topic.
    topics: Vec<Topic>,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl WebhookBroadcaster {
    pub fn new(
        url: impl Into<String>,
        topics: Vec<Topic>,
        timeout: Option<Duration>,
    ) -> Result<Self, SinkError> {
        let url = url.into();
        let timeout = timeout.unwrap_or(DEFAULT_WEBHOOK_TIMEOUT);
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: format!("webhook:{url}"),
            url,
            topics,
            timeout,
            http_client,
        })
    }

    pub fn accepts(&self, topic: Topic) -> bool {
        self.topics.is_empty() || self.topics.contains(&topic)
    }
}

#[async_trait]
impl BroadcastSink for WebhookBroadcaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn deadline(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    async fn publish(&self, topic: Topic, message: &StreamMessage) -> Result<(), SinkError> {
        if !self.accepts(topic) {
            return Ok(());
        }

        let body = serde_json::to_string(message)?;
        let response = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Ascep-Topic", topic.as_str())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %self.url, topic = %topic, "Webhook delivered");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SinkError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_filter() {
        let all = WebhookBroadcaster::new("http://localhost:9/hook", vec![], None).unwrap();
        assert!(Topic::ALL.iter().all(|t| all.accepts(*t)));
        assert_eq!(all.deadline(), Some(DEFAULT_WEBHOOK_TIMEOUT));

        let alerts = WebhookBroadcaster::new(
            "http://localhost:9/hook",
            vec![Topic::Alerts],
            Some(Duration::from_millis(1500)),
        )
        .unwrap();
        assert!(alerts.accepts(Topic::Alerts));
        assert!(!alerts.accepts(Topic::Logs));
        assert_eq!(alerts.name(), "webhook:http://localhost:9/hook");
        assert_eq!(alerts.deadline(), Some(Duration::from_millis(1500)));
    }

    #[tokio::test]
    async fn test_filtered_topic_is_not_sent() {
        // Port 9 is never contacted because the topic is filtered out.
        let sink =
            WebhookBroadcaster::new("http://127.0.0.1:9/hook", vec![Topic::Alerts], None).unwrap();
        let result = sink
            .publish(Topic::Logs, &StreamMessage::Lagged { skipped: 0 })
            .await;
        assert!(result.is_ok());
    }
}
