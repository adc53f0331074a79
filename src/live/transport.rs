use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::AppError;
use crate::live::codec;

/// Opens text-frame connections to a live channel endpoint.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, base_url: &str) -> Result<Box<dyn ChannelStream>, AppError>;
}

#[async_trait]
pub trait ChannelStream: Send {
    async fn send_text(&mut self, text: String) -> Result<(), AppError>;

    /// Next text frame; `None` once the peer has closed.
    async fn next_text(&mut self) -> Option<Result<String, AppError>>;

    async fn close(&mut self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(&self, base_url: &str) -> Result<Box<dyn ChannelStream>, AppError> {
        let url = codec::endpoint_url(base_url);
        debug!("Connecting to {}", url);
        let (socket, _response) = connect_async(url.as_str()).await?;
        Ok(Box::new(WsStream { socket }))
    }
}

pub struct WsStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl ChannelStream for WsStream {
    async fn send_text(&mut self, text: String) -> Result<(), AppError> {
        self.socket.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String, AppError>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            debug!("Close handshake failed: {}", e);
        }
    }
}
