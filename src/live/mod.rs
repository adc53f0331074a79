//! Push channel carrying badge scans and WhatsApp bridge status.

pub mod codec;
pub mod event;
pub mod manager;
pub mod merge;
pub mod session;
pub mod transport;
pub mod whatsapp;

pub use event::LiveEvent;
pub use manager::{ChannelLease, ChannelState, ConnectionManager};
pub use merge::{CaptureMode, LiveMerge, MergeOutcome, Notice, NoticeLevel};
pub use session::LiveSession;
pub use transport::{ChannelConnector, ChannelStream, WsConnector};
pub use whatsapp::{SessionTracker, WhatsAppState};
