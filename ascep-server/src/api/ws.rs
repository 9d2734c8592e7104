use ascep_sdk::objects::{StreamMessage, Topic, UnknownTopic};
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct StreamQuery {
    /// Comma-separated topic names.
    topics: Option<String>,
}

/// Parse `?topics=a,b`. Missing or empty selects every topic.
fn parse_topics(raw: Option<&str>) -> Result<Vec<Topic>, UnknownTopic> {
    let topics: Vec<Topic> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::parse::<Topic>)
        .collect::<Result<Vec<_>, _>>()?;
    if topics.is_empty() {
        Ok(Topic::ALL.to_vec())
    } else {
        Ok(topics)
    }
}

/// `GET /ws`: WebSocket stream of published messages.
///
/// Pushes one [`StreamMessage`] JSON frame per message on the selected
/// topics. A subscriber that falls behind receives a `lagged` frame with
/// the number of messages it missed.
pub(super) async fn stream_ws(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let topics =
        parse_topics(query.topics.as_deref()).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    // Subscribe before the upgrade so nothing published meanwhile is lost.
    let rx = state.stream.subscribe();
    Ok(ws.on_upgrade(move |socket| handle_stream(socket, rx, topics)))
}

/// Drives a single WebSocket connection until the client leaves or the
/// broadcaster is dropped.
async fn handle_stream(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<StreamMessage>,
    topics: Vec<Topic>,
) {
    tracing::debug!(?topics, "WS: subscriber connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                let message = match result {
                    Ok(message) => message,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WS: subscriber lagged");
                        StreamMessage::Lagged { skipped }
                    }
                    Err(RecvError::Closed) => break,
                };
                let wanted = message.topic().is_none_or(|topic| topics.contains(&topic));
                if wanted && send_json(&mut socket, &message).await.is_err() {
                    return;
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        tracing::debug!("WS: subscriber disconnected");
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = socket.send(Message::Close(None)).await;
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
///
/// Returns `Err(())` if the send fails (client disconnected).
async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topics() {
        assert_eq!(parse_topics(None).unwrap(), Topic::ALL.to_vec());
        assert_eq!(parse_topics(Some("")).unwrap(), Topic::ALL.to_vec());
        assert_eq!(
            parse_topics(Some("alerts, logs")).unwrap(),
            vec![Topic::Alerts, Topic::Logs]
        );
        assert!(parse_topics(Some("alerts,bogus")).is_err());
    }
}
