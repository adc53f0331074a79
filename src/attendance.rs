use serde::Serialize;

use crate::error::AppError;
use crate::models::{
    AttendanceEntry, AttendanceRecord, AttendanceStatus, SaveAttendanceEntry,
    SaveAttendanceRequest,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub excused: u32,
}

impl StatusCounts {
    pub fn total(&self) -> u32 {
        self.present + self.absent + self.late + self.excused
    }

    pub fn get(&self, status: AttendanceStatus) -> u32 {
        match status {
            AttendanceStatus::Present => self.present,
            AttendanceStatus::Absent => self.absent,
            AttendanceStatus::Late => self.late,
            AttendanceStatus::Excused => self.excused,
        }
    }
}

/// Counts entries by status, from scratch.
pub fn recompute_counts(entries: &[AttendanceEntry]) -> StatusCounts {
    entries
        .iter()
        .fold(StatusCounts::default(), |mut counts, entry| {
            match entry.status {
                AttendanceStatus::Present => counts.present += 1,
                AttendanceStatus::Absent => counts.absent += 1,
                AttendanceStatus::Late => counts.late += 1,
                AttendanceStatus::Excused => counts.excused += 1,
            }
            counts
        })
}

/// Present share rounded to a whole percent; 0 for an empty sheet.
pub fn attendance_rate(counts: &StatusCounts) -> u32 {
    let total = counts.total();
    if total == 0 {
        return 0;
    }
    ((counts.present as f64 / total as f64) * 100.0).round() as u32
}

/// Unsaved edits to one attendance sheet.
///
/// Holds the last server copy alongside the working copy; counts are derived
/// from the working rows on demand and the record's `*_count` fields are
/// rewritten after every edit so both views agree.
#[derive(Debug, Clone)]
pub struct AttendanceBuffer {
    paralelo_id: i64,
    server: AttendanceRecord,
    working: AttendanceRecord,
}

impl AttendanceBuffer {
    pub fn from_server(paralelo_id: i64, record: AttendanceRecord) -> Self {
        let mut working = record.clone();
        sync_counts(&mut working);
        Self {
            paralelo_id,
            server: record,
            working,
        }
    }

    pub fn paralelo_id(&self) -> i64 {
        self.paralelo_id
    }

    pub fn record(&self) -> &AttendanceRecord {
        &self.working
    }

    pub fn entries(&self) -> &[AttendanceEntry] {
        &self.working.students
    }

    pub fn counts(&self) -> StatusCounts {
        recompute_counts(&self.working.students)
    }

    pub fn is_dirty(&self) -> bool {
        self.working.students != self.server.students
    }

    /// Ids whose row differs from the server copy.
    pub fn changed_ids(&self) -> Vec<i64> {
        self.working
            .students
            .iter()
            .filter(|row| {
                self.server
                    .students
                    .iter()
                    .find(|s| s.id == row.id)
                    .is_none_or(|s| s != *row)
            })
            .map(|row| row.id)
            .collect()
    }

    pub fn set_status(&mut self, student_id: i64, status: AttendanceStatus) -> Result<(), AppError> {
        self.entry_mut(student_id)?.status = status;
        sync_counts(&mut self.working);
        Ok(())
    }

    pub fn set_notes(&mut self, student_id: i64, notes: impl Into<String>) -> Result<(), AppError> {
        let notes: String = notes.into();
        self.entry_mut(student_id)?.notes = Some(notes).filter(|n| !n.trim().is_empty());
        Ok(())
    }

    /// `time` is `HH:MM`; `None` clears it.
    pub fn set_arrival_time(&mut self, student_id: i64, time: Option<&str>) -> Result<(), AppError> {
        let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => {
                chrono::NaiveTime::parse_from_str(t, "%H:%M").map_err(|_| {
                    AppError::BadRequest(format!("Invalid arrival time (expected HH:MM): {}", t))
                })?;
                Some(t.to_string())
            }
            None => None,
        };
        self.entry_mut(student_id)?.arrival_time = time;
        Ok(())
    }

    pub fn mark_all(&mut self, status: AttendanceStatus) {
        for entry in &mut self.working.students {
            entry.status = status;
        }
        sync_counts(&mut self.working);
    }

    /// Treats the working copy as stored, for when the server accepted a save
    /// but its copy could not be reloaded.
    pub fn mark_saved(&mut self) {
        self.server = self.working.clone();
    }

    /// Drops local edits.
    pub fn reset(&mut self) {
        self.working = self.server.clone();
        sync_counts(&mut self.working);
    }

    pub fn to_request(&self) -> SaveAttendanceRequest {
        SaveAttendanceRequest {
            date: self.working.date,
            paralelo_id: self.paralelo_id,
            students: self
                .working
                .students
                .iter()
                .map(|s| SaveAttendanceEntry {
                    id: s.id,
                    status: s.status,
                    arrival_time: s.arrival_time.clone(),
                    notes: s.notes.clone(),
                })
                .collect(),
        }
    }

    fn entry_mut(&mut self, student_id: i64) -> Result<&mut AttendanceEntry, AppError> {
        self.working
            .students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or(AppError::NotFound)
    }
}

fn sync_counts(record: &mut AttendanceRecord) {
    let counts = recompute_counts(&record.students);
    record.present_count = counts.present;
    record.absent_count = counts.absent;
    record.late_count = counts.late;
    record.excused_count = counts.excused;
    record.total_students = record.students.len() as u32;
}
