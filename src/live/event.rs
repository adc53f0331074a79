use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanAction {
    #[default]
    CheckIn,
    CheckOut,
    AlreadyCheckedIn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanUser {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAttendance {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub paralelo_id: Option<i64>,
    #[serde(default)]
    pub action: ScanAction,
    #[serde(default)]
    pub record_id: Option<i64>,
}

/// A badge scan matched to a user and recorded by the reader bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceScan {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub user: Option<ScanUser>,
    #[serde(default)]
    pub attendance: Option<ScanAttendance>,
}

impl AttendanceScan {
    pub fn action(&self) -> ScanAction {
        self.attendance.as_ref().map(|a| a.action).unwrap_or_default()
    }

    /// e.g. `Ana: check-out recorded`.
    pub fn describe(&self) -> String {
        let name = self
            .user
            .as_ref()
            .map(|u| u.name.trim())
            .filter(|n| !n.is_empty())
            .unwrap_or("Student");
        let what = match self.action() {
            ScanAction::CheckOut => "check-out",
            ScanAction::CheckIn | ScanAction::AlreadyCheckedIn => "check-in",
        };
        format!("{}: {} recorded", name, what)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    #[serde(default)]
    pub last_connected: Option<String>,
    #[serde(default)]
    pub session_duration: Option<String>,
    #[serde(default)]
    pub messages_count: Option<u64>,
}

/// Payload of the WhatsApp bridge `status` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default)]
    pub stats: Option<SessionStats>,
}

/// Everything a live channel can deliver, transport signals included.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Connected,
    Disconnected { reason: String },
    ConnectError { message: String },
    /// The WhatsApp bridge started a session handshake.
    Connecting,
    Attendance(AttendanceScan),
    /// A badge no user owns yet.
    UnknownUid { uid: String, date: Option<String> },
    /// A bare read with no discriminator the bridge recognises.
    RfidRead { uid: String },
    Status(SessionStatus),
    Qr(String),
    WhatsAppError(String),
    Other { name: String, data: Value },
}

impl LiveEvent {
    /// Decodes a named channel event.
    ///
    /// Scan payloads are told apart by their `type` field, then `event`, then
    /// the channel event name. Payloads that do not fit their shape come back
    /// as [`LiveEvent::Other`].
    pub fn decode(name: &str, data: Value) -> LiveEvent {
        match name {
            "status" => match serde_json::from_value::<SessionStatus>(data.clone()) {
                Ok(status) => LiveEvent::Status(status),
                Err(e) => {
                    debug!("Malformed status payload: {}", e);
                    LiveEvent::Other {
                        name: name.to_string(),
                        data,
                    }
                }
            },
            "qr" => match data {
                Value::String(qr) => LiveEvent::Qr(qr),
                data => LiveEvent::Other {
                    name: name.to_string(),
                    data,
                },
            },
            "connecting" => LiveEvent::Connecting,
            "whatsapp_error" => LiveEvent::WhatsAppError(match data {
                Value::String(msg) => msg,
                Value::Object(map) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("WhatsApp error")
                    .to_string(),
                _ => "WhatsApp error".to_string(),
            }),
            "rfid_read" | "attendance" | "unknown_uid" => decode_scan(name, data),
            _ => LiveEvent::Other {
                name: name.to_string(),
                data,
            },
        }
    }

    /// Whether the event is a badge scan of any kind.
    pub fn is_scan(&self) -> bool {
        matches!(
            self,
            LiveEvent::Attendance(_) | LiveEvent::UnknownUid { .. } | LiveEvent::RfidRead { .. }
        )
    }
}

fn decode_scan(name: &str, data: Value) -> LiveEvent {
    let discriminator = data
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .or_else(|| data.get("event").and_then(Value::as_str))
        .filter(|t| !t.is_empty())
        .unwrap_or(name)
        .to_string();
    let uid = data
        .get("uid")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string);

    match (discriminator.as_str(), uid) {
        ("attendance", _) => match serde_json::from_value::<AttendanceScan>(data.clone()) {
            Ok(scan) => LiveEvent::Attendance(scan),
            Err(e) => {
                debug!("Malformed attendance payload: {}", e);
                LiveEvent::Other {
                    name: name.to_string(),
                    data,
                }
            }
        },
        ("unknown_uid", Some(uid)) => LiveEvent::UnknownUid {
            uid,
            date: data.get("date").and_then(Value::as_str).map(str::to_string),
        },
        ("unknown_uid", None) => LiveEvent::Other {
            name: name.to_string(),
            data,
        },
        (_, Some(uid)) => LiveEvent::RfidRead { uid },
        _ => LiveEvent::Other {
            name: name.to_string(),
            data,
        },
    }
}
