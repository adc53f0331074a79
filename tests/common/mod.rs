#![allow(dead_code)]

pub mod channel;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;

use aula::api::SchoolApi;
use aula::error::AppError;
use aula::models::{
    AttendanceRecord, GroupId, Member, MemberId, NewParentLink, PadreEstudiante, Paralelo,
    ParentLinkFilter, Relation, SaveAttendanceRequest, SaveAttendanceResponse,
};

pub fn paralelo(id: i64, grade: &str, section: &str) -> Paralelo {
    Paralelo {
        id,
        grade: grade.to_string(),
        section: section.to_string(),
        teacher_id: None,
        teacher: None,
        created_at: None,
        updated_at: None,
    }
}

pub fn members(ids: &[MemberId]) -> Vec<Member> {
    ids.iter()
        .map(|id| Member::new(*id, format!("Member {}", id)))
        .collect()
}

/// In-memory backend. Membership calls mutate `memberships`; ids listed in
/// `failing` make attach/detach/link calls fail.
#[derive(Default)]
pub struct FakeApi {
    pub paralelos: Vec<Paralelo>,
    pub roster: HashMap<Relation, Vec<Member>>,
    pub memberships: Mutex<HashMap<(Relation, GroupId), Vec<Member>>>,
    pub failing: HashSet<MemberId>,
    pub failing_groups: HashSet<GroupId>,
    pub links: Mutex<Vec<PadreEstudiante>>,
    pub deleted_links: Mutex<Vec<i64>>,
    pub attendance: Mutex<BTreeMap<(NaiveDate, GroupId), AttendanceRecord>>,
    pub saved: Mutex<Vec<SaveAttendanceRequest>>,
    pub history: Vec<AttendanceRecord>,
    pub calls: Mutex<Vec<String>>,
    /// Attendance fetches that succeed before the rest fail with 503.
    pub attendance_fetch_budget: Option<usize>,
    pub attendance_fetches: AtomicUsize,
    /// When set, roster fetches wait for a notification.
    pub gate: Option<Arc<Notify>>,
}

impl FakeApi {
    pub fn with_members(mut self, relation: Relation, group: GroupId, ids: &[MemberId]) -> Self {
        self.memberships
            .get_mut()
            .unwrap()
            .insert((relation, group), members(ids));
        self
    }

    pub fn member_ids(&self, relation: Relation, group: GroupId) -> Vec<MemberId> {
        let mut ids: Vec<MemberId> = self
            .memberships
            .lock()
            .unwrap()
            .get(&(relation, group))
            .map(|m| m.iter().map(|m| m.id).collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn add_link(&self, id: i64, padre_id: i64, estudiante_id: i64) {
        self.links.lock().unwrap().push(link(id, padre_id, estudiante_id));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, member_id: MemberId) -> Result<(), AppError> {
        if self.failing.contains(&member_id) {
            Err(AppError::Api {
                status: 500,
                message: format!("boom {}", member_id),
            })
        } else {
            Ok(())
        }
    }
}

fn link(id: i64, padre_id: i64, estudiante_id: i64) -> PadreEstudiante {
    PadreEstudiante {
        id,
        padre_id,
        estudiante_id,
        created_at: None,
        updated_at: None,
        padre: None,
        estudiante: None,
    }
}

#[async_trait]
impl SchoolApi for FakeApi {
    async fn fetch_paralelos(&self) -> Result<Vec<Paralelo>, AppError> {
        Ok(self.paralelos.clone())
    }

    async fn fetch_roster(&self, relation: Relation) -> Result<Vec<Member>, AppError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.roster.get(&relation).cloned().unwrap_or_default())
    }

    async fn fetch_members(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
    ) -> Result<Vec<Member>, AppError> {
        if self.failing_groups.contains(&paralelo_id) {
            return Err(AppError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .get(&(relation, paralelo_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn attach_member(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        member_id: MemberId,
    ) -> Result<(), AppError> {
        self.record(format!("attach {} {} {}", relation, paralelo_id, member_id));
        self.check(member_id)?;
        self.memberships
            .lock()
            .unwrap()
            .entry((relation, paralelo_id))
            .or_default()
            .push(Member::new(member_id, format!("Member {}", member_id)));
        Ok(())
    }

    async fn detach_member(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        member_id: MemberId,
    ) -> Result<(), AppError> {
        self.record(format!("detach {} {} {}", relation, paralelo_id, member_id));
        self.check(member_id)?;
        if let Some(list) = self
            .memberships
            .lock()
            .unwrap()
            .get_mut(&(relation, paralelo_id))
        {
            list.retain(|m| m.id != member_id);
        }
        Ok(())
    }

    async fn replace_members(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        member_ids: &[MemberId],
    ) -> Result<Vec<Member>, AppError> {
        self.record(format!("replace {} {} {:?}", relation, paralelo_id, member_ids));
        let list = members(member_ids);
        self.memberships
            .lock()
            .unwrap()
            .insert((relation, paralelo_id), list.clone());
        Ok(list)
    }

    async fn fetch_parent_links(
        &self,
        filter: ParentLinkFilter,
    ) -> Result<Vec<PadreEstudiante>, AppError> {
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| filter.padre_id.is_none_or(|id| id == l.padre_id))
            .filter(|l| filter.estudiante_id.is_none_or(|id| id == l.estudiante_id))
            .cloned()
            .collect())
    }

    async fn create_parent_link(&self, new: NewParentLink) -> Result<PadreEstudiante, AppError> {
        self.check(new.estudiante_id)?;
        let mut links = self.links.lock().unwrap();
        let id = links.iter().map(|l| l.id).max().unwrap_or(0) + 1;
        let created = link(id, new.padre_id, new.estudiante_id);
        links.push(created.clone());
        Ok(created)
    }

    async fn delete_parent_link(&self, link_id: i64) -> Result<(), AppError> {
        let mut links = self.links.lock().unwrap();
        let estudiante_id = links
            .iter()
            .find(|l| l.id == link_id)
            .map(|l| l.estudiante_id)
            .ok_or(AppError::NotFound)?;
        self.check(estudiante_id)?;
        links.retain(|l| l.id != link_id);
        self.deleted_links.lock().unwrap().push(link_id);
        Ok(())
    }

    async fn fetch_attendance(
        &self,
        date: NaiveDate,
        paralelo_id: GroupId,
    ) -> Result<AttendanceRecord, AppError> {
        let fetched = self.attendance_fetches.fetch_add(1, Ordering::SeqCst);
        if self.attendance_fetch_budget.is_some_and(|budget| fetched >= budget) {
            return Err(AppError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        self.attendance
            .lock()
            .unwrap()
            .get(&(date, paralelo_id))
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn save_attendance(
        &self,
        request: &SaveAttendanceRequest,
    ) -> Result<SaveAttendanceResponse, AppError> {
        self.saved.lock().unwrap().push(request.clone());
        let mut sheets = self.attendance.lock().unwrap();
        if let Some(record) = sheets.get_mut(&(request.date, request.paralelo_id)) {
            for row in &mut record.students {
                if let Some(saved) = request.students.iter().find(|s| s.id == row.id) {
                    row.status = saved.status;
                    row.arrival_time = saved.arrival_time.clone();
                    row.notes = saved.notes.clone();
                }
            }
            record.taken_by = Some("Prof. Test".to_string());
        }
        Ok(SaveAttendanceResponse {
            message: Some("Asistencia guardada".to_string()),
        })
    }

    async fn fetch_attendance_history(&self) -> Result<Vec<AttendanceRecord>, AppError> {
        Ok(self.history.clone())
    }
}
