//! Physical connections used by the reconnecting client.

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::Message;

use super::error::ClientError;

/// Outgoing text frames.
pub type TextSink = Pin<Box<dyn Sink<String, Error = ClientError> + Send>>;

/// Incoming text frames. The stream ends when the peer closes.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// One open connection, split into its two halves.
pub struct Transport {
    pub sink: TextSink,
    pub stream: TextStream,
}

/// Opens transports. Each call is one physical connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Address the connector dials, used in logs and errors.
    fn url(&self) -> &str;

    async fn connect(&self) -> Result<Transport, ClientError>;
}

/// WebSocket connector backed by tokio-tungstenite.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<Transport, ClientError> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::Connect {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let (sink, stream) = socket.split();

        let sink = sink
            .sink_map_err(|e| ClientError::Transport(e.to_string()))
            .with(|text: String| async move { Ok::<_, ClientError>(Message::text(text)) });

        // Control frames are answered by tungstenite itself; only text and
        // binary payloads reach the client.
        let stream = stream.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
                Ok(Message::Close(_)) => None,
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::Transport(e.to_string()))),
            }
        });

        Ok(Transport {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}
