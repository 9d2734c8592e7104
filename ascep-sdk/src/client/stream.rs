use futures_util::{Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{ClientError, EngineClient};
use crate::objects::{StreamMessage, Topic};

impl EngineClient {
    /// `GET /api/v1/ws` – subscribe to the live message stream.
    ///
    /// An empty `topics` slice subscribes to everything. The stream ends
    /// when the server closes the connection.
    pub async fn subscribe(
        &self,
        topics: &[Topic],
    ) -> Result<impl Stream<Item = Result<StreamMessage, ClientError>> + use<>, ClientError> {
        let url = ws_url(&self.base_url, topics)?;
        let (socket, _) = connect_async(url.as_str()).await?;

        Ok(socket.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => {
                    Some(serde_json::from_str::<StreamMessage>(&text).map_err(ClientError::from))
                }
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::from(e))),
            }
        }))
    }
}

fn ws_url(base: &Url, topics: &[Topic]) -> Result<Url, ClientError> {
    let mut url = base.join("/api/v1/ws")?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Ok(with_topics(url, topics)),
        other => return Err(ClientError::UnsupportedScheme(other.to_owned())),
    };
    url.set_scheme(scheme)
        .map_err(|()| ClientError::UnsupportedScheme(url.scheme().to_owned()))?;
    Ok(with_topics(url, topics))
}

fn with_topics(mut url: Url, topics: &[Topic]) -> Url {
    if !topics.is_empty() {
        let joined = topics.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(",");
        url.query_pairs_mut().append_pair("topics", &joined);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_from_http() {
        let base = Url::parse("http://localhost:8080").unwrap();
        let url = ws_url(&base, &[Topic::Alerts, Topic::Logs]).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/api/v1/ws?topics=alerts%2Clogs");
    }

    #[test]
    fn test_ws_url_from_https_without_topics() {
        let base = Url::parse("https://engine.example.com").unwrap();
        let url = ws_url(&base, &[]).unwrap();
        assert_eq!(url.as_str(), "wss://engine.example.com/api/v1/ws");
    }
}
