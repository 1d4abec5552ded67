//! Live-channel reader.
//!
//! Connects the WebSocket with the session token in the handshake query
//! string, then turns incoming text frames into [`ServerEvent`]s on a
//! channel. Frames that fail to parse are logged and skipped; the stream
//! ends when the socket closes or errors.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

use murmur_shared::protocol::ServerEvent;

use crate::error::ClientError;

/// Capacity of the decoded-event queue handed to the consumer.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Build the handshake URL from the API base URL and a session token.
fn live_url(base_url: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/ws?token={token}")
}

/// An open live channel delivering decoded server events.
pub struct LiveChannel {
    events: mpsc::Receiver<ServerEvent>,
    reader: JoinHandle<()>,
}

impl LiveChannel {
    /// Connect and authenticate against the server at `base_url` (the same
    /// base the [`crate::ApiClient`] uses).
    pub async fn connect(base_url: &str, token: &str) -> Result<Self, ClientError> {
        let url = live_url(base_url, token);
        let (stream, _) = connect_async(url.as_str()).await?;
        let (_, mut read) = stream.split();

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match ServerEvent::from_frame(&text) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!(error = %e, "ignoring unparseable frame"),
                    },
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        Ok(Self { events: rx, reader })
    }

    /// Next decoded event, or `None` once the channel has closed.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
