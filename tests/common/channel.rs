use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use aula::error::AppError;
use aula::live::{ChannelConnector, ChannelStream};

pub const OPEN_FRAME: &str =
    r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;

/// Server side of one fake connection.
pub struct FakeServer {
    pub to_client: mpsc::UnboundedSender<String>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl FakeServer {
    /// Completes the Engine.IO and Socket.IO handshakes.
    pub async fn accept(&mut self) {
        self.to_client.send(OPEN_FRAME.to_string()).unwrap();
        let connect = self.recv().await.expect("namespace connect");
        assert_eq!(connect, "40");
        self.to_client.send(r#"40{"sid":"n1"}"#.to_string()).unwrap();
    }

    pub fn emit(&self, frame: &str) {
        self.to_client.send(frame.to_string()).unwrap();
    }

    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), self.from_client.recv())
            .await
            .ok()
            .flatten()
    }
}

pub struct FakeConnector {
    pub connects: AtomicUsize,
    /// Number of initial connect attempts that fail.
    pub refuse: AtomicUsize,
    servers: mpsc::UnboundedSender<FakeServer>,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, Servers) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            connects: AtomicUsize::new(0),
            refuse: AtomicUsize::new(0),
            servers: tx,
        });
        (connector, Servers(Mutex::new(rx)))
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

pub struct Servers(Mutex<mpsc::UnboundedReceiver<FakeServer>>);

impl Servers {
    pub async fn next(&self) -> FakeServer {
        tokio::time::timeout(Duration::from_secs(2), self.0.lock().await.recv())
            .await
            .expect("no connection attempt")
            .expect("connector dropped")
    }
}

#[async_trait]
impl ChannelConnector for FakeConnector {
    async fn connect(&self, _base_url: &str) -> Result<Box<dyn ChannelStream>, AppError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(AppError::Channel("connection refused".to_string()));
        }

        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        let _ = self.servers.send(FakeServer {
            to_client,
            from_client,
        });
        Ok(Box::new(FakeStream { incoming, outgoing }))
    }
}

struct FakeStream {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl ChannelStream for FakeStream {
    async fn send_text(&mut self, text: String) -> Result<(), AppError> {
        self.outgoing
            .send(text)
            .map_err(|_| AppError::Channel("peer gone".to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, AppError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.incoming.close();
    }
}
