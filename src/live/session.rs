use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::live::event::LiveEvent;
use crate::live::manager::{ChannelLease, ChannelState, ConnectionManager};
use crate::live::merge::{CaptureMode, LiveMerge, MergeOutcome, Notice};
use crate::scope::ViewScope;

/// One view's subscription to a live channel.
///
/// Holds a lease on the shared connection and feeds its events through a
/// [`LiveMerge`]. Closing (or dropping) the session invalidates its scope
/// before the lease is released, so events still in flight are discarded.
pub struct LiveSession {
    id: Uuid,
    scope: ViewScope,
    merge: Arc<Mutex<LiveMerge>>,
    pump: JoinHandle<()>,
    lease: ChannelLease,
}

impl LiveSession {
    pub fn open(manager: &ConnectionManager, notices: mpsc::UnboundedSender<Notice>) -> Self {
        let id = Uuid::new_v4();
        let scope = ViewScope::new();
        let lease = manager.acquire();
        let mut events = lease.subscribe();

        let mut merge = LiveMerge::new(&scope, notices);
        if lease.state() == ChannelState::Connected {
            merge.apply(&LiveEvent::Connected);
        }
        let merge = Arc::new(Mutex::new(merge));

        let pump = {
            let merge = merge.clone();
            tokio::spawn(
                async move {
                    loop {
                        match events.recv().await {
                            Ok(event) => {
                                if lock(&merge).apply(&event) == MergeOutcome::Stale {
                                    break;
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                warn!("Live session lagged, {} events skipped", skipped);
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                    debug!("Live session pump stopped");
                }
                .instrument(info_span!("live_session", %id)),
            )
        };

        info!("Live session {} opened on {}", id, manager.url());
        Self {
            id,
            scope,
            merge,
            pump,
            lease,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn begin_capture(&self) {
        lock(&self.merge).begin_capture();
    }

    pub fn end_capture(&self) {
        lock(&self.merge).end_capture();
    }

    pub fn capture_mode(&self) -> CaptureMode {
        lock(&self.merge).capture_mode()
    }

    pub fn field(&self) -> Option<String> {
        lock(&self.merge).field()
    }

    pub fn set_field(&self, value: Option<String>) {
        lock(&self.merge).set_field(value);
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.merge).is_connected()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.lease.state()
    }

    /// Waits until a scan fills the pending field during the current capture
    /// session. A badge from an earlier session or a manual edit does not count.
    /// `None` if the session closed first.
    pub async fn wait_for_fill(&self) -> Option<String> {
        let mut captured = lock(&self.merge).watch_capture();
        let filled = captured.wait_for(Option::is_some).await.ok()?;
        filled.clone()
    }

    pub fn close(self) {
        info!("Live session {} closed", self.id);
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.scope.invalidate();
        self.pump.abort();
    }
}

fn lock(merge: &Mutex<LiveMerge>) -> MutexGuard<'_, LiveMerge> {
    merge.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
