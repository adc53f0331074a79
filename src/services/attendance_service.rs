use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::api::SchoolApi;
use crate::attendance::AttendanceBuffer;
use crate::error::AppError;
use crate::models::{AttendanceRecord, GroupId};

pub struct AttendanceService {
    api: Arc<dyn SchoolApi>,
}

impl AttendanceService {
    pub fn new(api: Arc<dyn SchoolApi>) -> Self {
        Self { api }
    }

    pub async fn open(&self, date: NaiveDate, paralelo_id: GroupId) -> Result<AttendanceBuffer, AppError> {
        let record = self.api.fetch_attendance(date, paralelo_id).await?;
        Ok(AttendanceBuffer::from_server(paralelo_id, record))
    }

    /// Saves the sheet, then reloads it so the buffer reflects what the
    /// server stored. If the save fails the buffer keeps its edits. A failed
    /// reload after a successful save is not an error: the buffer keeps the
    /// submitted rows as its server copy.
    pub async fn save(&self, buffer: &mut AttendanceBuffer) -> Result<String, AppError> {
        let request = buffer.to_request();
        let message = self
            .api
            .save_attendance(&request)
            .await?
            .message
            .unwrap_or_else(|| "Attendance saved".to_string());
        info!(
            "Saved attendance of paralelo {} for {}: {}",
            request.paralelo_id, request.date, message
        );

        match self
            .api
            .fetch_attendance(request.date, request.paralelo_id)
            .await
        {
            Ok(record) => *buffer = AttendanceBuffer::from_server(request.paralelo_id, record),
            Err(e) => {
                warn!(
                    "Attendance of paralelo {} saved but reload failed: {}",
                    request.paralelo_id, e
                );
                buffer.mark_saved();
            }
        }
        Ok(message)
    }

    /// Recorded sheets, newest first.
    pub async fn history(&self) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut records = self.api.fetch_attendance_history().await?;
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }
}
