//! Folding live events into view state.
//!
//! A [`LiveMerge`] belongs to one view. It fills the pending badge field at
//! most once per capture session, turns attendance scans into notices and
//! drops everything once its view scope has been invalidated.

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::live::event::LiveEvent;
use crate::scope::{Ticket, ViewScope};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    #[default]
    Idle,
    Capturing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient message for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Set for connectivity problems the channel retries on its own.
    pub retryable: bool,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            retryable: false,
        }
    }

    fn connectivity(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            retryable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The pending field received this badge id and capture ended.
    Filled(String),
    Notified,
    /// Connection indicator changed.
    Connection(bool),
    Ignored,
    /// The owning view is gone; nothing was touched.
    Stale,
}

pub struct LiveMerge {
    scope: ViewScope,
    ticket: Ticket,
    capture: CaptureMode,
    connected: bool,
    field: watch::Sender<Option<String>>,
    /// Badge taken by the current capture session, reset when a new one starts.
    captured: watch::Sender<Option<String>>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl LiveMerge {
    /// Binds to the current generation of `scope`.
    pub fn new(scope: &ViewScope, notices: mpsc::UnboundedSender<Notice>) -> Self {
        let (field, _) = watch::channel(None);
        let (captured, _) = watch::channel(None);
        Self {
            ticket: scope.ticket(),
            scope: scope.clone(),
            capture: CaptureMode::Idle,
            connected: false,
            field,
            captured,
            notices,
        }
    }

    pub fn is_live(&self) -> bool {
        self.scope.is_live(self.ticket)
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.capture
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Starts a capture session. The next unmatched scan fills the field.
    pub fn begin_capture(&mut self) {
        if self.is_live() {
            self.capture = CaptureMode::Capturing;
            self.captured.send_replace(None);
        }
    }

    pub fn end_capture(&mut self) {
        self.capture = CaptureMode::Idle;
    }

    pub fn field(&self) -> Option<String> {
        self.field.borrow().clone()
    }

    /// Manual edit of the pending field.
    pub fn set_field(&mut self, value: Option<String>) {
        if self.is_live() {
            self.field.send_replace(value);
        }
    }

    pub fn watch_field(&self) -> watch::Receiver<Option<String>> {
        self.field.subscribe()
    }

    /// Result of the current capture session; `None` until a scan fills it.
    /// Manual edits of the field do not show up here.
    pub fn watch_capture(&self) -> watch::Receiver<Option<String>> {
        self.captured.subscribe()
    }

    pub fn apply(&mut self, event: &LiveEvent) -> MergeOutcome {
        if !self.is_live() {
            debug!("Dropping {:?} for a closed view", event);
            return MergeOutcome::Stale;
        }

        match event {
            LiveEvent::UnknownUid { uid, .. } | LiveEvent::RfidRead { uid } => self.fill(uid),
            LiveEvent::Attendance(scan) => {
                self.notify(Notice::new(NoticeLevel::Info, scan.describe()));
                MergeOutcome::Notified
            }
            LiveEvent::Connected => {
                self.connected = true;
                MergeOutcome::Connection(true)
            }
            LiveEvent::Disconnected { reason } => {
                self.connected = false;
                self.notify(Notice::connectivity(
                    NoticeLevel::Warning,
                    format!("Reader connection lost ({}), retrying", reason),
                ));
                MergeOutcome::Connection(false)
            }
            LiveEvent::ConnectError { message } => {
                self.connected = false;
                self.notify(Notice::connectivity(
                    NoticeLevel::Error,
                    format!("No connection to the reader: {}", message),
                ));
                MergeOutcome::Notified
            }
            _ => MergeOutcome::Ignored,
        }
    }

    fn fill(&mut self, uid: &str) -> MergeOutcome {
        if self.capture != CaptureMode::Capturing {
            return MergeOutcome::Ignored;
        }
        // One fill per session so a later scan cannot overwrite manual edits.
        self.capture = CaptureMode::Idle;
        self.field.send_replace(Some(uid.to_string()));
        self.captured.send_replace(Some(uid.to_string()));
        info!("Captured badge {}", uid);
        self.notify(Notice::new(
            NoticeLevel::Success,
            format!("RFID captured: {}", uid),
        ));
        MergeOutcome::Filled(uid.to_string())
    }

    fn notify(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            debug!("Notice receiver dropped");
        }
    }
}
