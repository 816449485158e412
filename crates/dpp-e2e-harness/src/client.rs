//! Thin WebSocket client driving the four-stage verification protocol over
//! one connection, plus a small REST client for the read-only introspection
//! surface.

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection closed before a result frame arrived")]
    ClosedEarly,
    #[error("malformed frame: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// One end of a verification WebSocket connection.
pub struct DppClient {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl DppClient {
    pub async fn connect(ws_url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = tokio_tungstenite::connect_async(ws_url).await?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, value: &Value) -> Result<(), ClientError> {
        self.stream.send(Message::Text(value.to_string())).await?;
        Ok(())
    }

    /// Blocks for the next text frame, transparently absorbing ping/pong.
    pub async fn recv(&mut self) -> Result<Value, ClientError> {
        loop {
            return match self.stream.next().await {
                Some(Ok(Message::Text(text))) => Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => Err(ClientError::ClosedEarly),
                Some(Ok(other)) => Err(ClientError::UnexpectedFrame(format!("{other:?}"))),
                Some(Err(e)) => Err(e.into()),
            };
        }
    }
}

/// REST client for `/status`, `/verify`, `/sessions/{agent_id}`.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn status(&self) -> Result<Value, ClientError> {
        let url = format!("{}/status", self.base_url);
        Ok(self.http.get(url).send().await?.json().await?)
    }

    pub async fn verify_token(&self, token: &str) -> Result<Value, ClientError> {
        let url = format!("{}/verify", self.base_url);
        Ok(self
            .http
            .get(url)
            .query(&[("token", token)])
            .send()
            .await?
            .json()
            .await?)
    }

    pub async fn session_history(&self, agent_id: &str) -> Result<Value, ClientError> {
        let url = format!("{}/sessions/{}", self.base_url, agent_id);
        Ok(self.http.get(url).send().await?.json().await?)
    }
}
