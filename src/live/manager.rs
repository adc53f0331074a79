use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::config::ReconnectPolicy;
use crate::live::codec::{self, Packet, SocketPacket};
use crate::live::event::LiveEvent;
use crate::live::transport::{ChannelConnector, ChannelStream};

const EVENT_BUFFER: usize = 64;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the single connection to one live channel endpoint.
///
/// Consumers call [`ConnectionManager::acquire`] and hold the returned lease
/// while they need events. The first lease starts the connection, the last
/// lease dropped stops it. Clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    connector: Arc<dyn ChannelConnector>,
    policy: ReconnectPolicy,
    slot: Mutex<Slot>,
    wanted: watch::Sender<bool>,
    events: broadcast::Sender<LiveEvent>,
    state: Arc<watch::Sender<ChannelState>>,
}

#[derive(Default)]
struct Slot {
    refs: usize,
    driver_started: bool,
}

impl ConnectionManager {
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn ChannelConnector>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (wanted, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                connector,
                policy,
                slot: Mutex::new(Slot::default()),
                wanted,
                events,
                state: Arc::new(state),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Must be called from within a Tokio runtime.
    pub fn acquire(&self) -> ChannelLease {
        let mut slot = self.inner.lock_slot();
        slot.refs += 1;
        if !slot.driver_started {
            slot.driver_started = true;
            let driver = Driver {
                url: self.inner.url.clone(),
                connector: self.inner.connector.clone(),
                policy: self.inner.policy,
                wanted: self.inner.wanted.subscribe(),
                events: self.inner.events.clone(),
                state: self.inner.state.clone(),
            };
            tokio::spawn(driver.run());
        }
        if slot.refs == 1 {
            debug!("First consumer of {}, connecting", self.inner.url);
            self.inner.wanted.send_replace(true);
        }
        ChannelLease {
            inner: self.inner.clone(),
        }
    }

    pub fn ref_count(&self) -> usize {
        self.inner.lock_slot().refs
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }
}

impl Inner {
    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self) {
        let mut slot = self.lock_slot();
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs == 0 {
            debug!("Last consumer of {} left, disconnecting", self.url);
            self.wanted.send_replace(false);
        }
    }
}

/// Keeps the shared connection open while held.
pub struct ChannelLease {
    inner: Arc<Inner>,
}

impl ChannelLease {
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        self.inner.release();
    }
}

enum SessionEnd {
    Released,
    Dropped(String),
    Refused(String),
}

/// Background task that connects while at least one lease is held.
struct Driver {
    url: String,
    connector: Arc<dyn ChannelConnector>,
    policy: ReconnectPolicy,
    wanted: watch::Receiver<bool>,
    events: broadcast::Sender<LiveEvent>,
    state: Arc<watch::Sender<ChannelState>>,
}

impl Driver {
    async fn run(mut self) {
        // Exits once the manager and every lease are gone.
        while self.wanted.wait_for(|wanted| *wanted).await.is_ok() {
            self.serve().await;
            self.state.send_replace(ChannelState::Disconnected);
        }
        debug!("Driver for {} stopped", self.url);
    }

    async fn serve(&mut self) {
        let mut attempt: u32 = 0;
        loop {
            self.state.send_replace(ChannelState::Connecting);

            let connected = tokio::select! {
                result = self.connector.connect(&self.url) => result,
                _ = released(&mut self.wanted) => return,
            };

            match connected {
                Ok(mut stream) => {
                    let end = tokio::select! {
                        end = pump(stream.as_mut(), &self.events, &self.state, &mut attempt) => end,
                        _ = released(&mut self.wanted) => SessionEnd::Released,
                    };
                    stream.close().await;
                    match end {
                        SessionEnd::Released => return,
                        SessionEnd::Dropped(reason) => {
                            warn!("Live channel {} dropped: {}", self.url, reason);
                            let was_connected = *self.state.borrow() == ChannelState::Connected;
                            let event = if was_connected {
                                LiveEvent::Disconnected { reason }
                            } else {
                                LiveEvent::ConnectError { message: reason }
                            };
                            let _ = self.events.send(event);
                        }
                        SessionEnd::Refused(message) => {
                            warn!("Live channel {} refused: {}", self.url, message);
                            let _ = self.events.send(LiveEvent::ConnectError { message });
                        }
                    }
                }
                Err(e) => {
                    warn!("Live channel {} unreachable: {}", self.url, e);
                    let _ = self.events.send(LiveEvent::ConnectError {
                        message: e.to_string(),
                    });
                }
            }

            self.state.send_replace(ChannelState::Disconnected);
            let delay = self.policy.delay(attempt);
            attempt = attempt.saturating_add(1);
            debug!("Reconnecting to {} in {:?}", self.url, delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = released(&mut self.wanted) => return,
            }
        }
    }
}

/// Resolves once no lease is held, or the manager is gone.
async fn released(wanted: &mut watch::Receiver<bool>) {
    let _ = wanted.wait_for(|wanted| !*wanted).await;
}

/// Runs one connection: handshake, heartbeats and event fan-out.
async fn pump(
    stream: &mut dyn ChannelStream,
    events: &broadcast::Sender<LiveEvent>,
    state: &watch::Sender<ChannelState>,
    attempt: &mut u32,
) -> SessionEnd {
    let mut silence = HANDSHAKE_TIMEOUT;
    let mut connected = false;

    loop {
        let frame = match tokio::time::timeout(silence, stream.next_text()).await {
            Err(_) => return SessionEnd::Dropped("ping timeout".to_string()),
            Ok(None) => return SessionEnd::Dropped("transport close".to_string()),
            Ok(Some(Err(e))) => return SessionEnd::Dropped(e.to_string()),
            Ok(Some(Ok(frame))) => frame,
        };

        let packet = match codec::decode(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Skipping frame {:?}: {}", frame, e);
                continue;
            }
        };

        match packet {
            Packet::Open(handshake) => {
                debug!("Engine session {} open", handshake.sid);
                silence = handshake.liveness_timeout();
                if let Err(e) = stream.send_text(codec::encode_connect("/")).await {
                    return SessionEnd::Dropped(e.to_string());
                }
            }
            Packet::Ping(data) => {
                if let Err(e) = stream.send_text(codec::encode_pong(&data)).await {
                    return SessionEnd::Dropped(e.to_string());
                }
            }
            Packet::Close => return SessionEnd::Dropped("server close".to_string()),
            Packet::Message(SocketPacket::Connect { .. }) => {
                if !connected {
                    connected = true;
                    *attempt = 0;
                    state.send_replace(ChannelState::Connected);
                    info!("Live channel connected");
                    let _ = events.send(LiveEvent::Connected);
                }
            }
            Packet::Message(SocketPacket::ConnectError { message, .. }) => {
                return SessionEnd::Refused(message);
            }
            Packet::Message(SocketPacket::Disconnect { .. }) => {
                return SessionEnd::Dropped("server disconnect".to_string());
            }
            Packet::Message(SocketPacket::Event { name, data, .. }) => {
                let event = LiveEvent::decode(&name, data);
                debug!("Live event {}: {:?}", name, event);
                // No receivers just means nobody is listening right now.
                let _ = events.send(event);
            }
            Packet::Pong(_) | Packet::Upgrade | Packet::Noop | Packet::Message(SocketPacket::Ack { .. }) => {}
        }
    }
}
