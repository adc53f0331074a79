use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Late,
        AttendanceStatus::Excused,
    ];
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    #[serde(deserialize_with = "super::id_from_string_or_number")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parallel: Option<String>,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub arrival_time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AttendanceEntry {
    pub fn new(id: i64, name: impl Into<String>, status: AttendanceStatus) -> Self {
        Self {
            id,
            name: name.into(),
            parallel: None,
            status,
            arrival_time: None,
            notes: None,
        }
    }
}

/// One attendance sheet: a (date, paralelo) pair and its per-student rows.
///
/// The `*_count` fields are what the server reported; local code never edits
/// them directly and recomputes from `students` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub parallel: String,
    #[serde(default)]
    pub total_students: u32,
    #[serde(default)]
    pub present_count: u32,
    #[serde(default)]
    pub absent_count: u32,
    #[serde(default)]
    pub late_count: u32,
    #[serde(default)]
    pub excused_count: u32,
    #[serde(default)]
    pub taken_by: Option<String>,
    #[serde(default)]
    pub taken_at: Option<String>,
    #[serde(default)]
    pub students: Vec<AttendanceEntry>,
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "super::string_or_number")] String);

    Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|Wrapper(s)| s))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAttendanceEntry {
    pub id: i64,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveAttendanceRequest {
    pub date: NaiveDate,
    pub paralelo_id: i64,
    pub students: Vec<SaveAttendanceEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveAttendanceResponse {
    #[serde(default)]
    pub message: Option<String>,
}
