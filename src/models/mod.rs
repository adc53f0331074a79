pub mod agenda;
pub mod attendance;
pub mod estudiante;
pub mod materia;
pub mod member;
pub mod padre;
pub mod paralelo;
pub mod profesor;
pub mod reporte;
pub mod whatsapp;

pub use agenda::{AgendaEvent, AgendaFilter, AgendaRequest, AgendaScope, AgendaStatus};
pub use attendance::{
    AttendanceEntry, AttendanceRecord, AttendanceStatus, SaveAttendanceEntry,
    SaveAttendanceRequest, SaveAttendanceResponse,
};
pub use estudiante::{Estudiante, NewEstudianteRequest, UpdateEstudianteRequest};
pub use materia::{Materia, MateriaRequest};
pub use member::{GroupId, Member, MemberId, Relation};
pub use padre::{NewParentLink, Padre, PadreEstudiante, PadreRequest, ParentLinkFilter};
pub use paralelo::{Paralelo, ParaleloRequest};
pub use profesor::{Profesor, ProfesorCurso, ProfesorCursoDetalle, ProfesorRequest};
pub use reporte::{Report, ReportCategory, ReportCategoryRequest, ReportRequest};
pub use whatsapp::{
    TargetAudience, TemplateCategory, TemplateStatus, WhatsAppTemplate, WhatsAppTemplateRequest,
};

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Accepts `"3"` as well as `3`; the backend is not consistent about grade and id types.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

pub(crate) fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = string_or_number(deserializer)?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| serde::de::Error::custom(format!("invalid id: {}", raw)))
}
