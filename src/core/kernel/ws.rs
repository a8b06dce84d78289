use crate::core::errors::DConnectError;
use crate::core::kernel::codec::WsCodec;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{instrument, warn};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
        }
    }
}

/// WebSocket session trait - pure transport layer
#[async_trait]
pub trait WsSession<C: WsCodec>: Send + Sync {
    /// Connect to the WebSocket
    async fn connect(&mut self) -> Result<(), DConnectError>;

    /// Send a raw message
    async fn send_raw(&mut self, msg: Message) -> Result<(), DConnectError>;

    /// Receive the next raw message
    async fn next_raw(&mut self) -> Option<Result<Message, DConnectError>>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), DConnectError>;

    /// Send the handshake frame produced by the codec
    async fn handshake(&mut self, access_token: &str) -> Result<(), DConnectError>;

    /// Get the next decoded message
    async fn next_message(&mut self) -> Option<Result<C::Message, DConnectError>>;
}

/// Tungstenite-based WebSocket implementation
pub struct TungsteniteWs<C: WsCodec> {
    url: String,
    write: Option<SplitSink<Stream, Message>>,
    read: Option<SplitStream<Stream>>,
    connected: bool,
    codec: C,
    config: WsConfig,
}

impl<C: WsCodec> TungsteniteWs<C> {
    /// Create a new WebSocket session with the specified codec
    pub fn new(url: String, codec: C) -> Self {
        Self {
            url,
            write: None,
            read: None,
            connected: false,
            codec,
            config: WsConfig::default(),
        }
    }

    /// Set custom WebSocket configuration
    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl<C: WsCodec> WsSession<C> for TungsteniteWs<C> {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&mut self) -> Result<(), DConnectError> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);

        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| DConnectError::WebSocket("WebSocket connection timeout".to_string()))?
            .map_err(|e| DConnectError::WebSocket(format!("WebSocket connection failed: {}", e)))?;

        let (write, read) = ws_stream.split();
        self.write = Some(write);
        self.read = Some(read);
        self.connected = true;
        Ok(())
    }

    async fn send_raw(&mut self, msg: Message) -> Result<(), DConnectError> {
        if !self.connected {
            return Err(DConnectError::WebSocket("WebSocket not connected".to_string()));
        }

        let write = self.write.as_mut().ok_or_else(|| {
            DConnectError::WebSocket("WebSocket write stream not available".to_string())
        })?;

        write.send(msg).await.map_err(|e| {
            self.connected = false;
            DConnectError::WebSocket(format!("Failed to send WebSocket message: {}", e))
        })
    }

    async fn next_raw(&mut self) -> Option<Result<Message, DConnectError>> {
        loop {
            if !self.connected {
                return None;
            }
            let read = self.read.as_mut()?;

            match read.next().await {
                Some(Ok(Message::Close(_))) | None => {
                    self.connected = false;
                    return None;
                }
                Some(Ok(Message::Ping(data))) => {
                    // Auto-respond to pings at transport level
                    if let Err(e) = self.send_raw(Message::Pong(data)).await {
                        warn!("Failed to send pong response: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(message)) => return Some(Ok(message)),
                Some(Err(e)) => {
                    self.connected = false;
                    return Some(Err(DConnectError::WebSocket(format!(
                        "WebSocket error: {}",
                        e
                    ))));
                }
            }
        }
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn close(&mut self) -> Result<(), DConnectError> {
        if let Some(write) = self.write.as_mut() {
            let _ = write.send(Message::Close(None)).await;
        }
        self.connected = false;
        self.write = None;
        self.read = None;
        Ok(())
    }

    async fn handshake(&mut self, access_token: &str) -> Result<(), DConnectError> {
        let message = self.codec.encode_handshake(access_token)?;
        self.send_raw(message).await
    }

    async fn next_message(&mut self) -> Option<Result<C::Message, DConnectError>> {
        loop {
            match self.next_raw().await? {
                Ok(raw) => match self.codec.decode_message(raw) {
                    Ok(Some(decoded)) => return Some(Ok(decoded)),
                    Ok(None) => {}
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
