use serde::Serialize;

use crate::live::event::{LiveEvent, SessionStats};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WhatsAppState {
    #[default]
    Initializing,
    Connecting,
    Connected,
    NotConnected,
    Error,
}

impl std::fmt::Display for WhatsAppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WhatsAppState::Initializing => "initializing",
            WhatsAppState::Connecting => "connecting",
            WhatsAppState::Connected => "connected",
            WhatsAppState::NotConnected => "not_connected",
            WhatsAppState::Error => "error",
        };
        f.write_str(s)
    }
}

/// State of the WhatsApp bridge session as reported over the live channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionTracker {
    pub state: WhatsAppState,
    /// Pairing code to scan while not connected.
    pub qr: Option<String>,
    pub stats: SessionStats,
    pub error: Option<String>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether anything changed.
    pub fn apply(&mut self, event: &LiveEvent) -> bool {
        let before = self.clone();
        match event {
            LiveEvent::Connected => self.error = None,
            LiveEvent::ConnectError { .. } => {
                self.state = WhatsAppState::Error;
                self.error = Some("Cannot reach the WhatsApp bridge".to_string());
            }
            LiveEvent::Status(status) => {
                self.state = if status.connected {
                    WhatsAppState::Connected
                } else {
                    WhatsAppState::NotConnected
                };
                self.qr = status.qr.clone();
                self.stats = status.stats.clone().unwrap_or_default();
                self.error = None;
            }
            LiveEvent::Qr(qr) => {
                self.qr = Some(qr.clone());
                self.state = WhatsAppState::NotConnected;
            }
            LiveEvent::Connecting => self.state = WhatsAppState::Connecting,
            LiveEvent::WhatsAppError(message) => {
                self.error = Some(message.clone());
                self.state = WhatsAppState::Error;
            }
            _ => {}
        }
        *self != before
    }

    /// Local reset after a successful logout, before the bridge reports again.
    pub fn logged_out(&mut self) {
        self.qr = None;
        self.stats = SessionStats::default();
        self.error = None;
        self.state = WhatsAppState::NotConnected;
    }

    pub fn needs_pairing(&self) -> bool {
        self.state == WhatsAppState::NotConnected && self.qr.is_some()
    }
}
